//! RidgeKV CLI Client
//!
//! Command-line interface for interacting with RidgeKV.

use std::net::TcpStream;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ridgekv::protocol::{read_response, write_command, Command, Status};

/// RidgeKV CLI
#[derive(Parser, Debug)]
#[command(name = "ridgekv-cli")]
#[command(about = "CLI for RidgeKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Ping the server
    Ping,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let command = match args.command {
        Commands::Get { key } => Command::Get { key: key.into_bytes() },
        Commands::Set { key, value } => Command::Put {
            key: key.into_bytes(),
            value: value.into_bytes(),
        },
        Commands::Del { key } => Command::Delete { key: key.into_bytes() },
        Commands::Ping => Command::Ping,
    };

    let mut stream = match TcpStream::connect(&args.server) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to connect to {}: {}", args.server, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_command(&mut stream, &command) {
        eprintln!("failed to send command: {}", e);
        return ExitCode::FAILURE;
    }

    let response = match read_response(&mut stream) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to read response: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match response.status {
        Status::Ok => {
            match response.payload {
                Some(payload) => println!("{}", String::from_utf8_lossy(&payload)),
                None => println!("OK"),
            }
            ExitCode::SUCCESS
        }
        Status::NotFound => {
            println!("(nil)");
            ExitCode::SUCCESS
        }
        Status::Error => {
            let message = response
                .payload
                .map(|p| String::from_utf8_lossy(&p).into_owned())
                .unwrap_or_else(|| "unknown error".to_string());
            eprintln!("ERROR: {}", message);
            ExitCode::FAILURE
        }
    }
}
