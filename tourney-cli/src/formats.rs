use clap::Args;
use tourney_core::{Format, Generator};

use crate::Error;

#[derive(Debug, Args)]
pub struct Options {
    /// One of single_elimination, double_elimination, swiss_system or round_robin.
    #[clap(short, long)]
    format: Format,
}

impl Options {
    pub fn run(&self) -> Result<(), Error> {
        let options = Generator::options(self.format);

        println!("Key | Type | Default | Description");
        for (key, option) in options.sorted() {
            println!(
                "{} | {} | {:?} | {}",
                key,
                option.value.value_type(),
                option.value,
                option.name
            );
        }

        Ok(())
    }
}
