//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `movielog_core` linkage.
//! - Probe a storage backend selected on the command line.

use movielog_core::CatalogStorage;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("movielog_core version={}", movielog_core::core_version());

    let mut args = std::env::args().skip(1);
    let (Some(kind), Some(data_dir)) = (args.next(), args.next()) else {
        println!("usage: movielog_cli <json|csv|sqlite> <data-dir>");
        return ExitCode::SUCCESS;
    };

    match movielog_core::open_storage(&kind, Path::new(&data_dir)) {
        Ok(storage) => match storage.list_users() {
            Ok(users) => {
                println!("storage={kind} users={}", users.len());
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
