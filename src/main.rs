use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use entity_query::config::SchemaConfig;
use entity_query::sql_compiler::SqlCompiler;
use entity_query::{EntityQueryParser, EqlError};

const HELP: &str = "\
命令:
  :help     显示帮助
  :schema   显示当前实体的属性
  :quit     退出
其他输入按 EQL 解析，例如:
  name = 'john' and age > 18 order by name asc
  created >= startOfWeek() or tags contains ('a', NULL)";

struct Options {
    schema: Option<PathBuf>,
    query: Option<String>,
    verbose: bool,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let value_of = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    Options {
        schema: value_of("--schema").map(PathBuf::from),
        query: value_of("--query"),
        verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
    }
}

/// 加载实体配置，未指定配置文件时使用演示配置
fn load_schema(path: Option<&PathBuf>) -> Result<SchemaConfig> {
    match path {
        Some(path) => {
            let schema = SchemaConfig::from_json_file(path)
                .with_context(|| format!("无法加载实体配置 {}", path.display()))?;
            info!(path = %path.display(), "使用JSON配置文件");
            Ok(schema)
        }
        None => {
            warn!("未指定 --schema，使用演示配置");
            Ok(SchemaConfig::default())
        }
    }
}

/// 打印一次完整的处理流程：原始查询树、翻译后的查询树、SQL
fn run(parser: &EntityQueryParser, compiler: &SqlCompiler, line: &str) {
    let raw = match parser.parse_raw(line) {
        Ok(raw) => raw,
        Err(e) => return report(line, &e),
    };
    println!("[原始查询]  {}", raw);

    let typed = match parser.prepare(&raw) {
        Ok(typed) => typed,
        Err(e) => return report(line, &e),
    };
    println!("[翻译结果]  {}", typed);

    match compiler.compile(&typed) {
        Ok(result) => {
            println!("[生成的 SQL] {}", result.sql);
            for opt in &result.optimizations {
                println!("  • {:?}", opt);
            }
        }
        Err(e) => println!("✗ SQL 编译失败: {}", e),
    }
}

fn report(line: &str, error: &EqlError) {
    println!("✗ {}", error);
    if let EqlError::Parse(parse_error) = error {
        // 在输入下方标记出错位置
        println!("  {}", line);
        println!("  {}^", " ".repeat(parse_error.error_position));
        if !parse_error.context_expression.is_empty() {
            println!("  上下文: {}", parse_error.context_expression);
        }
    }
}

fn print_schema(schema: &SchemaConfig) {
    println!("表: {}", schema.table);
    for (name, property) in &schema.properties {
        match &property.translated_name {
            Some(translated) => println!("  {} ({}) -> {}", name, property.property_type, translated),
            None => println!("  {} ({})", name, property.property_type),
        }
    }
}

fn main() -> Result<()> {
    let options = parse_args();

    // 日志输出到 stderr，stdout 只输出结果
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("无法初始化日志")?;

    let schema = load_schema(options.schema.as_ref())?;
    let registry = schema.registry().context("实体配置无效")?;
    let parser = EntityQueryParser::for_registry(Arc::new(registry))?;
    let compiler = SqlCompiler::for_schema(&schema);

    if let Some(query) = options.query {
        run(&parser, &compiler, &query);
        return Ok(());
    }

    println!("--- EQL: 实体查询到 SQL ---");
    println!("输入 :help 查看帮助");

    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("eql> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                match line {
                    ":quit" | ":q" => break,
                    ":help" => println!("{}", HELP),
                    ":schema" => print_schema(&schema),
                    eql => run(&parser, &compiler, eql),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
