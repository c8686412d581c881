use clap::CommandFactory;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=crates/gridrows-cli/src/lib.rs");

    let cmd = gridrows_cli::Args::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buffer: Vec<u8> = Default::default();
    man.render(&mut buffer)?;

    let out_dir = match env::var_os("OUT_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => return Err(io::Error::new(io::ErrorKind::NotFound, "OUT_DIR not set")),
    };
    fs::write(out_dir.join("gridrows.1"), &buffer)?;

    // OUT_DIR is target/<profile>/build/<pkg>/out; copy next to the release binary for packaging
    if env::var("PROFILE").unwrap_or_default() == "release" {
        if let Some(release_dir) = out_dir.ancestors().nth(3) {
            fs::write(release_dir.join("gridrows.1"), &buffer)?;
        }
    }

    Ok(())
}
