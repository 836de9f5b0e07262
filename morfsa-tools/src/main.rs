use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::Serialize;
use structopt::StructOpt;

use morfsa::builder::FsaBuilder;
use morfsa::fsa::{self, AnyFsa, Fsa, FsaFlags};
use morfsa::memory::Memory;
use morfsa::serialize::{Cfsa2Serializer, Fsa5Serializer, FsaSerializer};
use morfsa::traversal::FsaInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Fsa5,
    Cfsa2,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fsa5" => Ok(Format::Fsa5),
            "cfsa2" => Ok(Format::Cfsa2),
            other => Err(format!("unknown format {:?}, expected fsa5 or cfsa2", other)),
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "morfsa-tools",
    about = "Compile word lists into minimal automata and inspect them."
)]
enum Opts {
    #[structopt(about = "Compile a word list, one entry per line, into an automaton")]
    Compile {
        #[structopt(parse(from_os_str))]
        input: PathBuf,

        #[structopt(parse(from_os_str))]
        output: PathBuf,

        #[structopt(short, long, default_value = "cfsa2", help = "fsa5 or cfsa2")]
        format: Format,

        #[structopt(long, help = "Store right-language counts for perfect hashing")]
        numbers: bool,

        #[structopt(long, help = "Input is already sorted and unique")]
        presorted: bool,

        #[structopt(long, help = "Filler byte (fsa5 only)")]
        filler: Option<char>,

        #[structopt(long, help = "Annotation separator byte (fsa5 only)")]
        annotation: Option<char>,
    },

    #[structopt(about = "Print every sequence an automaton accepts")]
    Dump {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },

    #[structopt(about = "Print header fields and statistics of an automaton")]
    Info {
        #[structopt(parse(from_os_str))]
        path: PathBuf,

        #[structopt(long)]
        json: bool,
    },

    #[structopt(about = "Print an automaton in Graphviz format")]
    Dot {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct Report {
    version: String,
    flags: FsaFlags,
    bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    goto_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_data_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexed_labels: Option<usize>,
    #[serde(flatten)]
    info: FsaInfo,
}

fn ascii_byte(c: char, what: &str) -> anyhow::Result<u8> {
    if !c.is_ascii() {
        bail!("{} must be an ASCII character, got {:?}", what, c);
    }
    Ok(c as u8)
}

fn read_lines(path: &Path, presorted: bool) -> anyhow::Result<Vec<Vec<u8>>> {
    let file = File::open(path).with_context(|| format!("Could not open {:?}", path))?;
    let mut lines = vec![];
    for line in BufReader::new(file).split(b'\n') {
        let mut line = line?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }

    if !presorted {
        lines.sort();
        lines.dedup();
    }
    Ok(lines)
}

#[allow(clippy::too_many_arguments)]
fn compile(
    input: &Path,
    output: &Path,
    format: Format,
    numbers: bool,
    presorted: bool,
    filler: Option<char>,
    annotation: Option<char>,
) -> anyhow::Result<()> {
    let lines = read_lines(input, presorted)?;
    log::info!("Read {} entries from {:?}", lines.len(), input);

    let automaton = FsaBuilder::build(&lines)
        .with_context(|| format!("Could not build an automaton from {:?}", input))?;

    let mut out = BufWriter::new(
        File::create(output).with_context(|| format!("Could not create {:?}", output))?,
    );
    let mut progress = |p: u8| log::debug!("Serializing: {}%", p);

    let written = match format {
        Format::Fsa5 => {
            let mut serializer = Fsa5Serializer::new();
            if numbers {
                serializer = serializer.with_numbers();
            }
            if let Some(c) = filler {
                serializer = serializer.with_filler(ascii_byte(c, "filler")?);
            }
            if let Some(c) = annotation {
                serializer = serializer.with_annotation_separator(ascii_byte(c, "annotation")?);
            }
            serializer.serialize_with_progress(&automaton, &mut out, &mut progress)?
        }
        Format::Cfsa2 => {
            if filler.is_some() || annotation.is_some() {
                bail!("--filler and --annotation only apply to fsa5");
            }
            let mut serializer = Cfsa2Serializer::new();
            if numbers {
                serializer = serializer.with_numbers();
            }
            serializer.serialize_with_progress(&automaton, &mut out, &mut progress)?
        }
    };

    println!(
        "Wrote {} entries in {} bytes to {:?}.",
        lines.len(),
        written,
        output
    );
    Ok(())
}

fn open(path: &Path) -> anyhow::Result<AnyFsa<impl Memory>> {
    fsa::open(path).with_context(|| format!("Could not read an automaton from {:?}", path))
}

fn dump(path: &Path) -> anyhow::Result<()> {
    let automaton = open(path)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for sequence in automaton.sequences() {
        out.write_all(&sequence)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

fn report<M: Memory>(automaton: &AnyFsa<M>) -> Report {
    let (goto_length, node_data_length, indexed_labels) = match automaton {
        AnyFsa::Fsa5(fsa) => (Some(fsa.goto_length()), Some(fsa.node_data_length()), None),
        AnyFsa::Cfsa2(fsa) => (None, None, Some(fsa.label_table().len().saturating_sub(1))),
    };

    Report {
        version: format!("{:#04x}", automaton.version()),
        flags: automaton.flags(),
        bytes: automaton.byte_len(),
        goto_length,
        node_data_length,
        indexed_labels,
        info: FsaInfo::compute(automaton),
    }
}

fn info(path: &Path, json: bool) -> anyhow::Result<()> {
    let automaton = open(path)?;
    let report = report(&automaton);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Version:          {}", report.version);
    println!("Flags:            {}", report.flags);
    println!("Bytes:            {}", report.bytes);
    if let Some(v) = report.goto_length {
        println!("Goto length:      {}", v);
    }
    if let Some(v) = report.node_data_length {
        println!("Node data length: {}", v);
    }
    if let Some(v) = report.indexed_labels {
        println!("Indexed labels:   {}", v);
    }
    println!("States:           {}", report.info.states);
    println!("Arcs:             {}", report.info.arcs);
    println!("Final arcs:       {}", report.info.final_arcs);
    println!("Sequences:        {}", report.info.sequences);
    Ok(())
}

fn dot(path: &Path) -> anyhow::Result<()> {
    let automaton = open(path)?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    morfsa::dot::write_dot(&automaton, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::from_args();

    match opts {
        Opts::Compile {
            input,
            output,
            format,
            numbers,
            presorted,
            filler,
            annotation,
        } => compile(
            &input, &output, format, numbers, presorted, filler, annotation,
        ),
        Opts::Dump { path } => dump(&path),
        Opts::Info { path, json } => info(&path, json),
        Opts::Dot { path } => dot(&path),
    }
}
