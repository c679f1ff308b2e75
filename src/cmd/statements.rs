use anyhow::Context;
use mysql_import::encoding;
use mysql_import::resolver;
use mysql_import::splitter::FileSplitter;
use serde::Serialize;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Delimiters tried, in order, when re-emitting statements that contain `;`.
const ROUTINE_DELIMITERS: [&str; 4] = ["$$", "//", ";;", "|"];

#[derive(Serialize)]
pub(crate) struct StatementJson {
    file: String,
    start_offset: u64,
    end_offset: u64,
    text: String,
}

pub fn run(inputs: Vec<PathBuf>, encoding: String, json: bool) -> anyhow::Result<()> {
    let encoding = encoding::validate(&encoding)?;
    let files = resolver::resolve(&inputs, encoding)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut collected = Vec::new();

    for dump in &files {
        let file = dump.path.display().to_string();
        let splitter = FileSplitter::open(dump)?;
        if !json {
            writeln!(out, "-- {}", file)?;
        }
        for statement in splitter {
            let statement = statement.with_context(|| format!("failed to split {}", file))?;
            if json {
                collected.push(StatementJson {
                    file: file.clone(),
                    start_offset: statement.start_offset,
                    end_offset: statement.end_offset,
                    text: statement.text,
                });
            } else if statement.text.contains(';') {
                let delimiter = routine_delimiter(&statement.text).with_context(|| {
                    format!(
                        "no free delimiter for statement at offset {} in {}",
                        statement.start_offset, file
                    )
                })?;
                writeln!(out, "DELIMITER {}", delimiter)?;
                writeln!(out, "{}{}", statement.text, delimiter)?;
                writeln!(out, "DELIMITER ;")?;
            } else {
                writeln!(out, "{};", statement.text)?;
            }
        }
    }

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&collected)?)?;
    }
    out.flush()?;
    Ok(())
}

/// First candidate that only occurs once `text` is terminated with it.
fn routine_delimiter(text: &str) -> Option<&'static str> {
    ROUTINE_DELIMITERS.into_iter().find(|delimiter| {
        let terminated = format!("{}{}", text, delimiter);
        terminated.find(delimiter) == Some(text.len())
    })
}
