use clap::{Parser, Subcommand};
use setlog_core::report;
use setlog_core::*;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status for actions the user can correct by doing something else
const EXIT_REDIRECT: u8 = 2;

#[derive(Parser)]
#[command(name = "setlog")]
#[command(about = "Strength training log: trainings, sets, weights and reps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Numeric user id
    #[arg(long, global = true, env = "SETLOG_USER")]
    user: Option<i64>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register on first contact
    Register,

    /// Show the current stage and what can be done next
    Status,

    /// Start or end a training
    Training {
        #[command(subcommand)]
        action: Toggle,
    },

    /// Manage the exercise catalog
    Exercise {
        #[command(subcommand)]
        action: ExerciseAction,
    },

    /// Choose the exercise for the next set
    Choose {
        /// Exercise name
        name: String,
    },

    /// Start or end a set
    Set {
        #[command(subcommand)]
        action: Toggle,
    },

    /// Answer the current prompt (weight or reps)
    Input {
        /// Weight such as 62.5 or 62,5, or a rep count
        text: String,
    },

    /// Statistics over the whole training history
    Stats {
        /// Write the CSV report to a file (defaults to the report directory)
        #[arg(long, num_args = 0..=1, conflicts_with = "json")]
        csv: Option<Option<PathBuf>>,

        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum Toggle {
    Start,
    End,
}

#[derive(Subcommand)]
enum ExerciseAction {
    /// Add an exercise to the catalog
    Add {
        /// Exercise name
        name: String,
    },

    /// List the catalog, five entries per page
    List {
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(dir) = cli.data_dir {
        config.data.data_dir = dir;
    }
    setlog_core::logging::init_with_level(&config.logging.level);

    let Some(user) = cli.user.map(UserId) else {
        eprintln!("No user given. Pass --user <id> or set SETLOG_USER.");
        return ExitCode::from(EXIT_REDIRECT);
    };

    let engine = SessionEngine::new(FileStore::new(&config.data.data_dir));

    match run(&engine, user, cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Precondition(Precondition::AlreadyRegistered)) => {
            println!("Welcome back!");
            show_stage(&engine, user)
        }
        Err(e) if e.is_recoverable() => {
            eprintln!("{}", e);
            eprintln!("{}", redirect(&e));
            ExitCode::from(EXIT_REDIRECT)
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(
    engine: &SessionEngine<FileStore>,
    user: UserId,
    command: Commands,
    config: &Config,
) -> Result<()> {
    match command {
        Commands::Register => {
            engine.register(user)?;
            println!("Registered. Start a training with `setlog training start`.");
            Ok(())
        }
        Commands::Status => {
            let stage = engine.stage(user)?;
            print_next_steps(stage);
            Ok(())
        }
        Commands::Training { action } => {
            let stage = match action {
                Toggle::Start => engine.start_training(user)?,
                Toggle::End => engine.end_training(user)?,
            };
            print_next_steps(stage);
            Ok(())
        }
        Commands::Exercise { action } => match action {
            ExerciseAction::Add { name } => {
                let seq = engine.add_catalog_entry(user, &name)?;
                println!("✓ Added #{} {}", seq, name.trim());
                Ok(())
            }
            ExerciseAction::List { page } => cmd_list(engine, user, page),
        },
        Commands::Choose { name } => {
            let stage = engine.choose_exercise(user, &name)?;
            println!("Next set: {}", name.trim());
            print_next_steps(stage);
            Ok(())
        }
        Commands::Set { action } => {
            let stage = match action {
                Toggle::Start => engine.start_set(user)?,
                Toggle::End => engine.end_set(user)?,
            };
            print_next_steps(stage);
            Ok(())
        }
        Commands::Input { text } => {
            let stage = engine.submit_input(user, &text)?;
            println!("✓ Recorded {}", text.trim());
            print_next_steps(stage);
            Ok(())
        }
        Commands::Stats { csv, json } => cmd_stats(engine, user, csv, json, config),
    }
}

fn cmd_list(engine: &SessionEngine<FileStore>, user: UserId, page: u32) -> Result<()> {
    let catalog = engine.catalog_page(user, page)?;

    if catalog.max_pages == 0 {
        println!("Your catalog is empty. Add one with `setlog exercise add <name>`.");
        return Ok(());
    }
    if catalog.is_empty() {
        println!(
            "No exercises on page {} (there are {} pages).",
            page, catalog.max_pages
        );
        return Ok(());
    }

    println!("Exercises, page {}/{}", catalog.page_number, catalog.max_pages);
    for entry in &catalog.entries {
        println!("  {}. {}", entry.seq, entry.name);
    }
    if catalog.has_previous() {
        println!("  ← --page {}", catalog.page_number - 1);
    }
    if catalog.has_next() {
        println!("  → --page {}", catalog.page_number + 1);
    }
    Ok(())
}

fn cmd_stats(
    engine: &SessionEngine<FileStore>,
    user: UserId,
    csv: Option<Option<PathBuf>>,
    json: bool,
    config: &Config,
) -> Result<()> {
    let bundle = engine.stats(user)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bundle)?);
        return Ok(());
    }

    match csv {
        Some(path) => {
            let path = path
                .unwrap_or_else(|| config.report_dir().join(format!("stats-{}.csv", user)));
            report::write_csv_file(&bundle, &path)?;
            println!("✓ Report written to {}", path.display());
        }
        None => report::write_csv(&bundle, io::stdout().lock())?,
    }
    Ok(())
}

fn show_stage(engine: &SessionEngine<FileStore>, user: UserId) -> ExitCode {
    match engine.stage(user) {
        Ok(stage) => {
            print_next_steps(stage);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_next_steps(stage: Stage) {
    println!("Stage: {}", stage);
    match stage {
        Stage::AwaitingWeight => println!("Enter the weight: `setlog input <weight>`"),
        Stage::AwaitingReps => println!("Enter the reps: `setlog input <reps>`"),
        _ => {
            for action in available_actions(stage) {
                println!("  {}", command_for(*action));
            }
        }
    }
}

fn command_for(action: Action) -> &'static str {
    match action {
        Action::StartTraining => "setlog training start",
        Action::EndTraining => "setlog training end",
        Action::AddExercise => "setlog exercise add <name>",
        Action::ChooseExercise => "setlog choose <name>",
        Action::StartSet => "setlog set start",
        Action::EndSet => "setlog set end",
        Action::EnterWeight | Action::EnterReps => "setlog input <value>",
        Action::ShowStats => "setlog stats",
    }
}

/// What to tell the user after a refused action
fn redirect(e: &Error) -> &'static str {
    match e {
        Error::Validation(ValidationError::InvalidWeightFormat(_)) => {
            "Please enter the weight again, e.g. `setlog input 62.5`."
        }
        Error::Validation(ValidationError::InvalidRepsFormat(_)) => {
            "Please enter the reps again, e.g. `setlog input 8`."
        }
        Error::Validation(ValidationError::EmptyExerciseName) => "Give the exercise a name.",
        Error::Precondition(p) => match p {
            Precondition::TrainingAlreadyActive => {
                "Choose an exercise with `setlog choose <name>` or finish with `setlog training end`."
            }
            Precondition::NoActiveTraining => "Start a training with `setlog training start`.",
            Precondition::NoExerciseChosen => "Choose an exercise first: `setlog choose <name>`.",
            Precondition::NoActiveSet => "Start a set with `setlog set start`.",
            Precondition::SetAlreadyActive => "End the running set with `setlog set end`.",
            Precondition::NotAwaitingWeight
            | Precondition::NotAwaitingReps
            | Precondition::NotAwaitingInput => "Nothing to enter right now. See `setlog status`.",
            Precondition::AlreadyRegistered => "Welcome back!",
        },
        _ => "Train a little more and try again.",
    }
}
