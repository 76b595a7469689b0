use std::path::{Path, PathBuf};

use angle_name::Name;
use angle_xml::Forest;
use angle_xpath::{parse, CompileOptions, Context, Environment, Evaluator, Item};
use angle_xslt::{Resolver, Stylesheet, Transformer};
use clap::Parser;

use crate::common;

#[derive(Debug, Parser)]
pub(crate) struct Transform {
    /// XSLT stylesheet file
    stylesheet: PathBuf,
    /// input xml file or url (default stdin)
    infile: Option<PathBuf>,
    /// Initial mode
    #[arg(short = 'm', long)]
    mode: Option<String>,
    /// output file (default stdout)
    #[arg(short = 'f', long = "file")]
    outfile: Option<PathBuf>,
    /// Directory for included documents and secondary outputs
    /// (ANGLE_CONTEXT_DIR overrides)
    #[arg(short = 'd', long = "context-dir")]
    context_dir: Option<PathBuf>,
    /// Stylesheet parameter as NAME=QUERY, evaluated against the input
    /// (repeatable)
    #[arg(short = 'p', long = "param")]
    params: Vec<String>,
    /// Print xsl:message output to stderr
    #[arg(short = 't', long)]
    trace: bool,
    /// Print nothing; only the exit status reports the outcome
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Transform {
    pub(crate) fn run(&self) -> anyhow::Result<u8> {
        let context_dir = std::env::var("ANGLE_CONTEXT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.context_dir.clone())
            .unwrap_or_else(|| {
                self.stylesheet
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            });

        let sheet_text = common::read_input(Some(&self.stylesheet))?;
        let input_text = common::read_input(self.infile.as_ref())?;

        let mut forest = Forest::new();
        let dir = context_dir.clone();
        let resolver = move |href: &str| -> angle_xslt::Result<String> {
            let path = dir.join(href);
            std::fs::read_to_string(&path)
                .map_err(|err| angle_xslt::Error::Io(format!("{}: {}", path.display(), err)))
        };
        let resolver: &Resolver = &resolver;

        let sheet = Stylesheet::load_with_resolver(&mut forest, &sheet_text, resolver)?;
        let source = forest.parse(&input_text)?;

        // parameters are XPath queries evaluated against the source document
        let mut parameters = Vec::new();
        for entry in &self.params {
            let (name, query) = entry.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("parameter {:?} is not in NAME=QUERY form", entry)
            })?;
            let expr = parse(query, &sheet.namespaces, &CompileOptions::default())?;
            let mut env = Environment::new();
            env.namespaces = sheet.namespaces.clone();
            let mut evaluator = Evaluator::new(&forest, &mut env);
            let value = evaluator.evaluate(&expr, &Context::new(Item::Node(source)))?;
            parameters.push((Name::local(name), value));
        }

        let mut transformer = Transformer::new(&mut forest, &sheet)
            .with_resolver(resolver)
            .with_initial_mode(self.mode.clone())
            .with_output_dir(context_dir);
        for (name, value) in parameters {
            transformer = transformer.with_parameter(name, value);
        }
        if self.trace {
            transformer =
                transformer.with_trace(Box::new(|message| eprintln!("xsl:message: {}", message)));
        }

        let result = transformer.transform(source)?;
        let rendered = transformer.render(result);
        if !self.quiet {
            common::write_output(self.outfile.as_ref(), &rendered)?;
        } else if let Some(outfile) = &self.outfile {
            common::write_output(Some(outfile), &rendered)?;
        }
        Ok(0)
    }
}
