//! Man page generator for upsctl
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]
//!
//! Writes `upsctl.1` plus one page per subcommand (`upsctl-upload.1`, ...).

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut buffer)?;

    let path = dir.join(format!("{}.1", name));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> std::io::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));

    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let main_page = render(cmd.clone(), &output_dir, "upsctl")?;
    println!("Man page generated at: {}", main_page.display());

    for sub in cmd.get_subcommands() {
        let name = format!("upsctl-{}", sub.get_name());
        let page = render(sub.clone().name(&name), &output_dir, &name)?;
        println!("Man page generated at: {}", page.display());
    }

    println!("\nTo view the man page:");
    println!("  man -l {}", main_page.display());

    Ok(())
}
