use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use angle_xml::{Forest, Node, ParseOptions, PiHandlers};

// stable exit codes: 1 unsatisfied, 2 load/parse/compile, >= 121 I/O
pub(crate) const EXIT_UNSATISFIED: u8 = 1;
pub(crate) const EXIT_LOAD: u8 = 2;
pub(crate) const EXIT_IO: u8 = 121;

/// Map a failed run to its exit code by inspecting the error chain.
pub(crate) fn classify(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.is::<std::io::Error>() {
            return EXIT_IO;
        }
        if let Some(err) = cause.downcast_ref::<angle_xslt::Error>() {
            return match err {
                angle_xslt::Error::Terminate(_) => EXIT_UNSATISFIED,
                angle_xslt::Error::Io(_) => EXIT_IO,
                _ => EXIT_LOAD,
            };
        }
        if let Some(err) = cause.downcast_ref::<angle_xpath::Error>() {
            return match err {
                angle_xpath::Error::Io(_) => EXIT_IO,
                _ => EXIT_LOAD,
            };
        }
        if cause.is::<angle_xml::ParseError>() || cause.is::<angle_schematron::Error>() {
            return EXIT_LOAD;
        }
    }
    EXIT_LOAD
}

/// Read an input document from a path, an `http(s)` URL, or stdin (`-`).
pub(crate) fn read_input(input: Option<&PathBuf>) -> anyhow::Result<String> {
    let Some(path) = input else {
        return read_stdin();
    };
    let text = path.to_string_lossy();
    if text == "-" {
        return read_stdin();
    }
    if text.starts_with("http://") || text.starts_with("https://") {
        let body = ureq::get(&text)
            .set("Accept", "text/xml")
            .call()
            .with_context(|| format!("fetching {}", text))?
            .into_string()?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn read_stdin() -> anyhow::Result<String> {
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

pub(crate) fn parse_document(
    forest: &mut Forest,
    text: &str,
    options: &ParseOptions,
) -> anyhow::Result<Node> {
    let doc = forest.parse_with(text, options, &PiHandlers::new())?;
    Ok(doc)
}

/// Write to a file or stdout.
pub(crate) fn write_output(outfile: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    match outfile {
        Some(path) => {
            let mut file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            file.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                file.write_all(b"\n")?;
            }
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}
