use std::io::{Read, Write};

use anyhow::Context;
use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;
use protoc_gen_trellis::{FatalDiagnostic, RawCodeGeneratorRequest};

fn main() -> anyhow::Result<()> {
    if std::env::args().skip(1).any(|arg| arg == "--version") {
        println!("protoc-gen-trellis {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let response = match run() {
        Ok(response) => response,
        Err(err) => {
            if let Some(fatal) = err.downcast_ref::<FatalDiagnostic>() {
                protoc_gen_trellis::report_fatal(fatal);
                std::process::exit(2);
            }
            CodeGeneratorResponse {
                error: Some(format!("{err:#}")),
                ..Default::default()
            }
        }
    };

    std::io::stdout()
        .write_all(&response.encode_to_vec())
        .context("failed to write response to stdout")
}

fn run() -> anyhow::Result<CodeGeneratorResponse> {
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("failed to read request from stdin")?;

    let request =
        RawCodeGeneratorRequest::decode(buf.as_slice()).context("failed to decode CodeGeneratorRequest")?;

    protoc_gen_trellis::generate(&request)
}
