use std::{
    env,
    error::Error,
    ffi::OsString,
    fs::File,
    io::{BufWriter, Write},
};

use htmlz_rs::*;
use tracing::info;

fn usage(args: &[OsString]) -> String {
    let prog = args
        .first()
        .map_or("htmlz-demo".into(), |arg0| arg0.to_string_lossy());
    format!("Usage: {} c|l|d input output", prog)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("htmlz_rs=debug".parse()?)
                .add_directive("htmlz_demo=info".parse()?),
        )
        .init();

    let args: Vec<OsString> = env::args_os().collect();

    if args.len() < 4 {
        println!("{}", usage(&args));
        return Ok(());
    }

    let mode = &args[1];
    let inp_fn = &args[2];
    let outp_fn = &args[3];

    verify_tables()?;

    let inp = std::fs::read(inp_fn)?;
    let outp;

    match mode.to_str() {
        Some("c") => {
            outp = compress_to_vec(&inp, CompressionLevel::Full)?;
        }
        Some("l") => {
            outp = compress_to_vec(&inp, CompressionLevel::LiteralsOnly)?;
        }
        Some("d") => {
            outp = decompress_to_vec(&inp, None)?;
        }
        _ => {
            println!("Invalid mode {}", mode.to_string_lossy());
            return Ok(());
        }
    }

    info!(
        input = %inp_fn.to_string_lossy(),
        input_len = inp.len(),
        output_len = outp.len(),
        "done"
    );

    let mut outp_f = BufWriter::new(File::create(outp_fn)?);
    outp_f.write_all(&outp)?;
    outp_f.flush()?;

    Ok(())
}
