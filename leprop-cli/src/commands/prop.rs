//! `leprop getprop` / `leprop setprop` — one-shot client requests.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use leprop_core::{PROP_NAME_MAX, PROP_VALUE_MAX};
use leprop_service::{paths, PropertyClient};

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Property name.
    pub name: String,

    /// Daemon socket path.
    #[arg(long, env = "LEPROP_SOCKET")]
    pub socket: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Property name.
    pub name: String,

    /// New value; may be empty.
    pub value: String,

    /// Daemon socket path.
    #[arg(long, env = "LEPROP_SOCKET")]
    pub socket: Option<PathBuf>,
}

impl GetArgs {
    pub fn run(self) -> Result<()> {
        let client = client(self.socket);
        let value = client
            .get_property(&self.name)
            .with_context(|| format!("getprop {}", self.name))?;
        println!("{value}");
        Ok(())
    }
}

impl SetArgs {
    pub fn run(self) -> Result<()> {
        if self.name.len() > PROP_NAME_MAX {
            eprintln!("warning: name longer than {PROP_NAME_MAX} bytes will be truncated");
        }
        if self.value.len() > PROP_VALUE_MAX {
            eprintln!("warning: value longer than {PROP_VALUE_MAX} bytes will be truncated");
        }
        let client = client(self.socket);
        client
            .set_property(&self.name, &self.value)
            .with_context(|| format!("setprop {}", self.name))?;
        Ok(())
    }
}

fn client(socket: Option<PathBuf>) -> PropertyClient {
    PropertyClient::new(socket.unwrap_or_else(paths::socket_path))
}
