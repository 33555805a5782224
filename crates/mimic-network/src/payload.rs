use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{NetworkWeights, ShapeError};

/// On-disk form of a network: the layer-size array plus every weight
/// flattened row-major, layer by layer.
///
/// ```json
/// { "layers": [8, 12, 4], "weights": [0.12, -0.5, ...] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightPayload {
    pub layers: Vec<usize>,
    pub weights: Vec<f32>,
}

/// How far a payload's flattened weights were from the expected count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadFill {
    /// Weights missing from the payload and filled with random values.
    pub missing: usize,
    /// Trailing weights in the payload that were ignored.
    pub surplus: usize,
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PayloadError {
    #[display("failed to access weight payload {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to parse weight payload {}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl NetworkWeights {
    #[must_use]
    pub fn to_payload(&self) -> WeightPayload {
        WeightPayload {
            layers: self.layer_sizes().to_vec(),
            weights: self.as_flat().to_vec(),
        }
    }

    /// Rebuilds a network by replaying the payload's layer-size array.
    ///
    /// A payload that carries fewer weights than its layer sizes imply is
    /// not an error: the shortfall is filled with values drawn uniformly
    /// from `[-1, 1]`. Surplus weights are dropped. Both cases are logged.
    /// Only an invalid layer-size array is rejected.
    pub fn from_payload<R>(
        payload: &WeightPayload,
        rng: &mut R,
    ) -> Result<(Self, PayloadFill), ShapeError>
    where
        R: Rng + ?Sized,
    {
        let mut next = payload.weights.iter().copied();
        let mut fill = PayloadFill::default();
        let net = Self::from_fn(&payload.layers, |_, _, _| {
            next.next().unwrap_or_else(|| {
                fill.missing += 1;
                rng.random_range(-1.0..=1.0)
            })
        })?;
        fill.surplus = next.count();

        if fill.missing > 0 {
            warn!(
                expected = net.len(),
                actual = payload.weights.len(),
                "weight payload too short, filled {} weights randomly",
                fill.missing
            );
        }
        if fill.surplus > 0 {
            warn!(
                expected = net.len(),
                actual = payload.weights.len(),
                "weight payload too long, ignored {} weights",
                fill.surplus
            );
        }
        Ok((net, fill))
    }
}

pub fn read_payload<P>(path: P) -> Result<WeightPayload, PayloadError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| PayloadError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| PayloadError::Json {
        path: path.to_owned(),
        source,
    })
}

pub fn write_payload<P>(path: P, payload: &WeightPayload) -> Result<(), PayloadError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let io_error = |source: io::Error| PayloadError::Io {
        path: path.to_owned(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, payload).map_err(|source| PayloadError::Json {
        path: path.to_owned(),
        source,
    })?;
    writeln!(writer).map_err(io_error)?;
    writer.flush().map_err(io_error)
}
