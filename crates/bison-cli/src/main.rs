use anyhow::Context;
use bison_cli::{encode_json, inspect, read_input, Formatter, InspectOutput};
use bison_common::{init_logging, BisonConfig};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bison-cli")]
#[command(version)]
#[command(about = "Inspect and encode length-prefixed binary documents")]
struct Args {
    /// TOML 配置文件
    #[arg(short, long, global = true, env = "BISON_CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志级别
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 解析文档并打印元素
    Inspect {
        file: PathBuf,

        /// 输入为十六进制文本
        #[arg(long)]
        hex: bool,

        /// 以扩展 JSON 输出
        #[arg(long)]
        json: bool,
    },

    /// 把 JSON 对象编码为文档
    Encode {
        json_file: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 输出十六进制文本
        #[arg(long)]
        hex: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BisonConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BisonConfig::default(),
    };
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    init_logging(&config.log)?;

    match args.command {
        Command::Inspect { file, hex, json } => {
            let data = read_input(&file, hex)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let output = if json {
                InspectOutput::Json
            } else {
                InspectOutput::Table
            };
            let text = inspect(&data, &config.codec, output, &Formatter::new(!args.no_color))?;
            print!("{}", text);
            if json {
                println!();
            }
        }
        Command::Encode {
            json_file,
            output,
            hex,
        } => {
            let text = fs::read_to_string(&json_file)
                .with_context(|| format!("failed to read {}", json_file.display()))?;
            let bytes = encode_json(&text, &config.codec)?;
            let payload = if hex {
                format!("{}\n", hex::encode(&bytes)).into_bytes()
            } else {
                bytes
            };
            match output {
                Some(path) => fs::write(&path, &payload)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => std::io::stdout().lock().write_all(&payload)?,
            }
        }
    }

    Ok(())
}
