mod command;
mod course;
mod evolution;
mod logging;
mod operator;
mod util;

fn main() -> anyhow::Result<()> {
    logging::init();
    command::run()
}
