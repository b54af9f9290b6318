use clap::{Parser, Subcommand};

use crate::{dump::Dump, generate::Generate, info::Info, query::Query};

mod common;
mod dump;
mod generate;
mod info;
mod query;
mod source;

#[derive(Parser)]
struct Options {
	#[clap(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	Generate(Generate),
	Info(Info),
	Dump(Dump),
	Query(Query),
}

fn main() {
	env_logger::init();

	let opts: Options = Options::parse();
	match opts.command {
		Command::Generate(generate) => generate::generate(generate),
		Command::Info(info) => info::info(info),
		Command::Dump(dump) => dump::dump(dump),
		Command::Query(query) => query::query(query),
	}
}
