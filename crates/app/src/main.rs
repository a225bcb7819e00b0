use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use quiz_core::model::{
    ExamDistribution, Question, QuizId, QuizSettings, SessionKind, SlotKey, TopicTag, UserId,
};
use services::{
    AttemptHistoryService, Clock, Entry, FinalReport, FinalizationLedger, Progress, QuizEngine,
    ResumeOffer, StartRequest, Step,
};
use storage::load_bank_file;
use storage::repository::Storage;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum CliError {
    InvalidDbUrl { raw: String },
    InputClosed,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            CliError::InputClosed => write!(f, "input closed; progress has been saved"),
        }
    }
}

impl std::error::Error for CliError {}

/// Driving-theory quiz sessions backed by SQLite.
#[derive(Debug, Parser)]
#[command(name = "quiz", version, about)]
struct Cli {
    /// SQLite database URL or path.
    #[arg(long, global = true, env = "QUIZ_DB_URL", default_value = "sqlite://quiz.sqlite3")]
    db: String,

    /// Identity used for attempts, streaks and the resume slot.
    #[arg(long, global = true, env = "QUIZ_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load a JSON question bank into the database.
    Seed {
        #[arg(long, env = "QUIZ_BANK_PATH")]
        bank: PathBuf,
    },
    /// Play a quiz, resuming an interrupted one when possible.
    Play(PlayArgs),
    /// Show streak, pending session and statistics.
    Status {
        #[arg(long, env = "QUIZ_PASS_THRESHOLD", default_value_t = 35)]
        pass_threshold: u32,

        /// Number of recent attempts to aggregate.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Debug, ClapArgs)]
struct PlayArgs {
    /// Quiz only this topic instead of the full exam.
    #[arg(long)]
    topic: Option<TopicTag>,

    #[arg(long, env = "QUIZ_PASS_THRESHOLD", default_value_t = 35)]
    pass_threshold: u32,

    #[arg(long, env = "QUIZ_TIME_LIMIT_SECS", default_value_t = 20)]
    time_limit_secs: u32,

    #[arg(long, env = "QUIZ_TARGET_COUNT", default_value_t = 40)]
    target_count: u32,

    /// Let the question timer run out instead of waiting for input.
    #[arg(long)]
    no_timer: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| CliError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(CliError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

//
// ─── CONSOLE ───────────────────────────────────────────────────────────────────
//

struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn prompt(&mut self, text: &str) -> Result<String, Box<dyn std::error::Error>> {
        print_flush(text).await?;
        self.lines
            .next_line()
            .await?
            .map(|line| line.trim().to_string())
            .ok_or_else(|| CliError::InputClosed.into())
    }

    /// `None` when `limit` elapses first.
    async fn prompt_within(
        &mut self,
        text: &str,
        limit: Duration,
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        print_flush(text).await?;
        match tokio::time::timeout(limit, self.lines.next_line()).await {
            Ok(line) => Ok(Some(
                line?.map(|l| l.trim().to_string()).ok_or(CliError::InputClosed)?,
            )),
            Err(_) => Ok(None),
        }
    }
}

async fn print_flush(text: &str) -> std::io::Result<()> {
    let mut out = tokio::io::stdout();
    out.write_all(text.as_bytes()).await?;
    out.flush().await
}

enum Input {
    Pick(Vec<String>),
    Skip,
    Back,
    Quit,
    Invalid,
}

/// Parses `1,3` or `1 3` into option texts; `p` goes back, `q` quits.
fn parse_input(raw: &str, question: &Question) -> Input {
    match raw {
        "" => return Input::Skip,
        "p" => return Input::Back,
        "q" => return Input::Quit,
        _ => {}
    }
    let mut picks = Vec::new();
    for token in raw.split([',', ' ']).filter(|t| !t.is_empty()) {
        let Some(option) = token
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| question.options().get(i))
        else {
            return Input::Invalid;
        };
        if !picks.contains(option) {
            picks.push(option.clone());
        }
    }
    if !question.is_multi_select() && picks.len() > 1 {
        return Input::Invalid;
    }
    Input::Pick(picks)
}

fn render_question(question: &Question, progress: Progress, selected: &[String]) -> String {
    let mut text = format!(
        "\n[{}/{} {}%] {} ({})\n",
        progress.current,
        progress.total,
        progress.percentage,
        question.prompt(),
        question.topic()
    );
    for (i, option) in question.options().iter().enumerate() {
        let mark = if selected.contains(option) { '*' } else { ' ' };
        text.push_str(&format!(" {mark}{}. {option}\n", i + 1));
    }
    if question.is_multi_select() {
        text.push_str("several answers possible, e.g. 1,3\n");
    }
    text.push_str("> ");
    text
}

fn print_report(report: &FinalReport) {
    let r = &report.report;
    println!();
    println!(
        "{} ({}): {}/{} {}",
        report.quiz_id,
        report.kind,
        r.score,
        r.max_score,
        if r.passing { "PASSED" } else { "failed" }
    );
    for (topic, score) in &r.thematic_breakdown {
        println!(
            "  {:<30} {}/{} ({:.0}%)",
            topic.as_str(),
            score.correct,
            score.total,
            score.percentage()
        );
    }
    println!("best run of correct answers: {}", report.best_session_streak);
    println!("daily streak: {}", report.calendar_streak);
}

fn describe_offer(offer: &ResumeOffer) -> String {
    format!(
        "{} ({}) at question {}/{}, {} answered",
        offer.quiz_id,
        offer.kind,
        offer.current_index + 1,
        offer.total,
        offer.answered
    )
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn seed(storage: &Storage, bank: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let bank = load_bank_file(&bank).await?;
    storage.questions.upsert_questions(bank.questions()).await?;
    println!("seeded {} questions", bank.len());
    for (topic, count) in bank.inventory() {
        println!("  {:<30} {count}", topic.as_str());
    }
    Ok(())
}

async fn play(
    storage: &Storage,
    user: UserId,
    args: PlayArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = QuizSettings::new(
        ExamDistribution::official(),
        args.pass_threshold,
        args.time_limit_secs,
        args.target_count,
    )?;
    let mut engine = QuizEngine::open(
        storage,
        user,
        settings,
        Clock::default_clock(),
        FinalizationLedger::new(),
    )
    .await?;
    let mut console = Console::new();

    let exam = QuizId::exam();
    let scope = if args.topic.is_some() {
        None
    } else {
        Some(&exam)
    };

    let mut resumed = false;
    match engine.enter(scope).await? {
        Entry::Resumed(progress) => {
            println!("resuming at question {}/{}", progress.current, progress.total);
            resumed = true;
        }
        Entry::Finalized(report) => {
            println!("an earlier attempt was already complete");
            print_report(&report);
            engine.flush().await;
            return Ok(());
        }
        Entry::ResumeOffered(offer) => {
            let answer = console
                .prompt(&format!("resume {}? [y/N] ", describe_offer(&offer)))
                .await?;
            if answer.eq_ignore_ascii_case("y") {
                engine.accept_resume()?;
                resumed = true;
            } else {
                engine.discard_resume()?;
            }
        }
        Entry::Fresh => {}
    }

    if !resumed {
        let request = match args.topic {
            Some(topic) => {
                let questions: Vec<Question> = storage
                    .questions
                    .list_questions()
                    .await?
                    .into_iter()
                    .filter(|q| q.topic() == topic)
                    .take(usize::try_from(engine.settings().target_count()).unwrap_or(usize::MAX))
                    .collect();
                StartRequest::with_questions(SessionKind::Generated, questions)
            }
            None => StartRequest::exam(),
        };
        engine.start_session(request).await?;
    }

    let limit = engine.question_time_limit();
    loop {
        let (Some(question), Some(progress)) =
            (engine.current_question().cloned(), engine.progress())
        else {
            break;
        };
        let selected = engine
            .session()
            .and_then(|s| s.answers().get(question.id()).map(<[String]>::to_vec))
            .unwrap_or_default();
        let text = render_question(&question, progress, &selected);

        let raw = if args.no_timer {
            Some(console.prompt(&text).await?)
        } else {
            console.prompt_within(&text, limit).await?
        };
        let Some(raw) = raw else {
            println!("\ntime is up");
            if engine.next()? == Step::Completed {
                break;
            }
            continue;
        };

        match parse_input(&raw, &question) {
            Input::Pick(picks) => {
                engine.set_selections(question.id(), picks)?;
                if engine.next()? == Step::Completed {
                    break;
                }
            }
            Input::Skip => {
                if engine.next()? == Step::Completed {
                    break;
                }
            }
            Input::Back => {
                if let Err(e) = engine.previous() {
                    println!("{e}");
                }
            }
            Input::Quit => {
                engine.flush().await;
                println!("progress saved; run `quiz play` again to continue");
                return Ok(());
            }
            Input::Invalid => println!("enter option numbers, empty to skip, p or q"),
        }
    }

    let report = engine.finalize()?;
    print_report(&report);
    engine.flush().await;
    Ok(())
}

async fn status(
    storage: &Storage,
    user: UserId,
    pass_threshold: u32,
    limit: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Clock::default_clock();
    let streak = storage.streaks.load_streak(&user).await?;
    println!("user: {user}");
    println!("daily streak: {}", streak.current_on(clock.today()));

    match storage
        .snapshots
        .read_snapshot(&SlotKey::in_progress_for(&user))
        .await?
    {
        Some(snapshot) => println!(
            "unfinished: {}",
            describe_offer(&ResumeOffer::from_snapshot(&snapshot))
        ),
        None => println!("unfinished: none"),
    }

    let history = AttemptHistoryService::new(storage.attempts.clone());
    let stats = history.statistics(&user, pass_threshold, limit).await?;
    if stats.total_attempts == 0 {
        println!("no finished attempts yet");
        return Ok(());
    }
    println!(
        "attempts: {}  average: {:.1}  best: {}  passes in a row: {}",
        stats.total_attempts, stats.average_score, stats.best_score, stats.passing_streak
    );
    if !stats.weakest_topics.is_empty() {
        let weakest: Vec<&str> = stats.weakest_topics.iter().map(|t| t.as_str()).collect();
        println!("work on: {}", weakest.join(", "));
    }
    if !stats.strongest_topics.is_empty() {
        let strongest: Vec<&str> = stats.strongest_topics.iter().map(|t| t.as_str()).collect();
        println!("strong in: {}", strongest.join(", "));
    }
    for attempt in history.recent_attempts(&user, 5).await? {
        println!(
            "  {} {:<14} {}/{}",
            attempt.created_at.format("%Y-%m-%d %H:%M"),
            attempt.quiz_id,
            attempt.final_score.unwrap_or_default(),
            attempt.max_score
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging();

    let user = UserId::new(cli.user)?;
    let db_url = normalize_sqlite_url(cli.db);

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&db_url)?;
    let storage = Storage::sqlite(&db_url).await?;
    tracing::debug!(db = %db_url, "storage ready");

    match cli.command {
        Command::Seed { bank } => seed(&storage, bank).await,
        Command::Play(args) => play(&storage, user, args).await,
        Command::Status {
            pass_threshold,
            limit,
        } => status(&storage, user, pass_threshold, limit).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
