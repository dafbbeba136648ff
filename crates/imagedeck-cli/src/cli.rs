//! Command line argument definitions.

use clap::{Args, Parser, Subcommand};
use imagedeck_core::models::{ConfigChanges, ConfigSection};

/// imagedeck - drive a DRBL/Clonezilla imaging server from the terminal.
#[derive(Debug, Parser)]
#[command(name = "imagedeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Imaging server URL (overrides config and IMAGEDECK_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login(LoginArgs),

    /// End the session on the server and remove it locally
    Logout(LogoutArgs),

    /// Create a new operator account
    Signup(SignupArgs),

    /// Show the server and session state
    Status,

    /// List images on the server
    Images(ImagesArgs),

    /// Restart the DRBL server
    Restart,

    /// Restart DRBL and let clients select a disk to image
    CreateImage,

    /// Restart DRBL and multicast an image to waiting clients
    RestoreImage(RestoreArgs),

    /// Restart DRBL and save client disks as an image
    SaveImage(SaveArgs),

    /// Change DRBL configuration fields and restart the service
    ApplyConfig(ApplyConfigArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Login name (defaults to the last one used)
    pub login: Option<String>,

    /// Remember the password in the OS keychain
    #[arg(long)]
    pub remember: bool,

    /// Always prompt, even if a password is remembered
    #[arg(long)]
    pub prompt: bool,
}

#[derive(Debug, Args)]
pub struct LogoutArgs {
    /// Also forget the remembered password
    #[arg(long)]
    pub forget: bool,
}

#[derive(Debug, Args)]
pub struct SignupArgs {
    pub login: String,
}

#[derive(Debug, Args)]
pub struct ImagesArgs {
    /// Keep polling and print the list whenever it is refreshed
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Image to restore
    pub image: String,

    /// Number of clients to wait for before multicasting
    #[arg(long, default_value_t = 0)]
    pub clients: u32,

    /// Seconds to wait for clients
    #[arg(long, default_value_t = 300)]
    pub max_wait: u32,
}

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Name for the new image (letters, digits and '-')
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ApplyConfigArgs {
    /// Field to change, as section.field=value (repeatable)
    #[arg(long = "set", value_name = "SECTION.FIELD=VALUE", required = true, value_parser = parse_assignment)]
    pub assignments: Vec<(ConfigSection, String, String)>,
}

impl ApplyConfigArgs {
    pub fn changes(&self) -> ConfigChanges {
        let mut changes = ConfigChanges::new();
        for (section, field, value) in &self.assignments {
            changes.set(*section, field, value);
        }
        changes
    }
}

fn parse_assignment(input: &str) -> Result<(ConfigSection, String, String), String> {
    ConfigChanges::parse_assignment(input)
}
