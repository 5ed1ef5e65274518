mod demo;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser as _;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use entity_query::{
    FieldRegistry, QueryAssembler, QueryConfig, QueryError, QueryRequest, SqlCompiler,
    ViewRegistry,
};

use demo::{User, UserDto};

const LOG_ENV: &str = "ENTITY_QUERY_LOG";

#[derive(Debug, clap::Parser)]
#[command(name = "entity-query", version, about = "对示例用户数据执行过滤、排序和视图查询")]
struct Cli {
    /// JSON配置文件路径
    #[arg(short, long, env = "ENTITY_QUERY_CONFIG", default_value = "query_config.json")]
    config: PathBuf,

    /// 过滤表达式，例如 "age >= 18 and status = 'active'"
    #[arg(short, long)]
    filter: Option<String>,

    /// 排序，例如 "createdAt:desc,name"
    #[arg(short, long)]
    sort: Option<String>,

    /// 视图名称
    #[arg(short, long)]
    view: Option<String>,

    /// 同时打印生成的 SQL
    #[arg(long)]
    sql: bool,
}

/// 初始化日志，优先读取 ENTITY_QUERY_LOG，其次 RUST_LOG
fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// 加载配置，失败时使用默认配置
fn load_config(path: &Path) -> QueryConfig {
    match QueryConfig::from_json_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "已加载查询配置");
            config
        }
        Err(e) => {
            tracing::warn!(error = %e, "无法加载配置文件，使用默认配置");
            QueryConfig::default()
        }
    }
}

struct Session<'r> {
    assembler: QueryAssembler<'r, User, UserDto>,
    views: &'r ViewRegistry<User, UserDto>,
    sql: SqlCompiler,
    users: &'r [User],
}

impl Session<'_> {
    /// 执行一次查询并打印结果
    fn run(&self, request: &QueryRequest, show_sql: bool) -> Result<(), QueryError> {
        let intent = self.assembler.assemble(request)?;
        let rows = intent.project_all(self.users);

        println!("[视图 {}] 匹配 {} / {} 条记录", intent.view().name(), rows.len(), self.users.len());
        for row in &rows {
            println!("  {}", row);
        }
        if !intent.includes().is_empty() {
            let paths: Vec<&str> = intent.includes().iter().map(|i| i.path()).collect();
            println!("  预加载: {}", paths.join(", "));
        }
        if show_sql {
            println!("[SQL]: {}", self.sql.compile(&intent));
        }
        Ok(())
    }
}

/// 打印查询错误，词法和语法错误附带位置标记
fn report_error(input: Option<&str>, err: &QueryError) {
    println!("✗ {} ({})", err, err.kind());

    let position = match err {
        QueryError::Lex(e) => e.position,
        QueryError::Parse(e) => e.position,
        _ => return,
    };
    if let Some(input) = input {
        let column = input.get(..position).map_or(position, |s| s.chars().count());
        println!("  {}", input);
        println!("  {}^", " ".repeat(column));
    }
}

#[derive(Debug, Default)]
struct ReplState {
    sort: Option<String>,
    view: Option<String>,
    sql: bool,
}

impl ReplState {
    fn request(&self, filter: Option<&str>) -> QueryRequest {
        QueryRequest {
            filter: filter.map(str::to_string),
            sort: self.sort.clone(),
            view: self.view.clone(),
        }
    }
}

fn print_help(fields: &FieldRegistry<User>, views: &ViewRegistry<User, UserDto>) {
    println!("输入过滤表达式执行查询，或使用以下命令:");
    println!("  :all             不带过滤条件查询");
    println!("  :sort <排序>     设置排序，留空清除");
    println!("  :view <视图>     设置视图，留空使用默认视图");
    println!("  :sql             切换 SQL 输出");
    println!("  :reset           清除排序和视图");
    println!("  :help            显示帮助");
    println!("  :quit            退出");
    println!("可用字段: {}", fields.keys().join(", "));
    println!("可用视图: {}", views.view_names().join(", "));
}

/// 交互模式
fn repl(session: &Session<'_>, fields: &FieldRegistry<User>, show_sql: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut state = ReplState {
        sql: show_sql,
        ..Default::default()
    };

    print_help(fields, session.views);

    loop {
        let line = match editor.readline("filter> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        // 命令格式 ":name 参数"
        if let Some(command) = line.strip_prefix(':') {
            let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
            let arg = arg.trim();
            match name {
                "q" | "quit" | "exit" => break,
                "help" => print_help(fields, session.views),
                "all" => {
                    if let Err(e) = session.run(&state.request(None), state.sql) {
                        report_error(None, &e);
                    }
                }
                "sort" => {
                    state.sort = (!arg.is_empty()).then(|| arg.to_string());
                    println!("排序: {}", state.sort.as_deref().unwrap_or("(无)"));
                }
                "view" => {
                    state.view = (!arg.is_empty()).then(|| arg.to_string());
                    println!("视图: {}", state.view.as_deref().unwrap_or("(默认)"));
                }
                "sql" => {
                    state.sql = !state.sql;
                    println!("SQL 输出: {}", if state.sql { "开" } else { "关" });
                }
                "reset" => {
                    state.sort = None;
                    state.view = None;
                    println!("已清除排序和视图");
                }
                other => println!("未知命令 :{}，输入 :help 查看帮助", other),
            }
            continue;
        }

        if let Err(e) = session.run(&state.request(Some(line)), state.sql) {
            report_error(state.sort.is_none().then_some(line), &e);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = load_config(&cli.config);
    let fields = demo::user_fields();
    let views = demo::user_views()?;
    views.validate(&fields)?;
    let users = demo::users();

    let session = Session {
        assembler: QueryAssembler::new(&fields, &views).with_limits(config.parse_limits()),
        views: &views,
        sql: SqlCompiler::new(config.table_name("User")),
        users: &users,
    };

    // 提供了任一查询参数时只执行一次
    if cli.filter.is_some() || cli.sort.is_some() || cli.view.is_some() {
        let request = QueryRequest {
            filter: cli.filter,
            sort: cli.sort,
            view: cli.view,
        };
        if let Err(e) = session.run(&request, cli.sql) {
            report_error(request.filter.as_deref().filter(|_| request.sort.is_none()), &e);
            return Err(e.into());
        }
        return Ok(());
    }

    repl(&session, &fields, cli.sql)
}
