use clap::{value_parser, Arg, ArgAction, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mirror::config::MirrorConfig;
use mirror::logging::{info, init_tracing};
use mirror::utils::{forward_signals, shutdown_channel};
use mirror::{client, server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("mirror")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Live two-way directory mirror")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.value_parser(value_parser!(PathBuf))
				.help("Configuration file (TOML or JSON5)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.global(true)
				.action(ArgAction::Count)
				.help("More logging (-v debug, -vv trace)"),
		)
		.subcommand(
			Command::new("serve")
				.about("Mirror a directory for one connecting peer at a time")
				.arg(Arg::new("dir").required(true))
				.arg(
					Arg::new("port")
						.short('p')
						.long("port")
						.value_parser(value_parser!(u16))
						.help("Listen port"),
				),
		)
		.subcommand(
			Command::new("connect")
				.about("Mirror a directory with a running server")
				.arg(Arg::new("dir").required(true))
				.arg(Arg::new("addr").required(true).help("Server address (host:port)")),
		)
		.get_matches();

	let mut config = MirrorConfig::load(matches.get_one::<PathBuf>("config").map(|p| p.as_path()))?;
	match matches.get_count("verbose") {
		0 => {}
		1 => config.log_level = "debug".to_string(),
		_ => config.log_level = "trace".to_string(),
	}
	init_tracing(&config.log_level);

	let (shutdown_tx, shutdown) = shutdown_channel();
	forward_signals(shutdown_tx);

	if let Some(matches) = matches.subcommand_matches("serve") {
		let dir = matches.get_one::<String>("dir").ok_or("serve: directory argument required")?;
		if let Some(port) = matches.get_one::<u16>("port") {
			config.port = *port;
		}
		server::serve(Path::new(dir), Arc::new(config), shutdown).await?;
	} else if let Some(matches) = matches.subcommand_matches("connect") {
		let dir = matches.get_one::<String>("dir").ok_or("connect: directory argument required")?;
		let addr = matches.get_one::<String>("addr").ok_or("connect: address argument required")?;
		let stats = client::connect(Path::new(dir), addr, Arc::new(config), shutdown).await?;
		info!("Done: {}", stats);
	}

	Ok(())
}

// vim: ts=4
