//! PulseLock CLI - Command-line interface for Synheart PulseLock
//!
//! Commands:
//! - enroll: Build and store a baseline fingerprint from captured samples
//! - verify: Run one authentication attempt against the stored baseline
//! - status: Show lockout state and recent attempts for a user
//! - reset: Administratively clear a user's lockout state

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use chrono::Utc;
use synheart_pulselock::error::StoreError;
use synheart_pulselock::types::HeartRateSample;
use synheart_pulselock::{
    AuthDecision, EngineConfig, PulseLockEngine, SampleWindow, SecureStore, SecurityLevel,
    PULSELOCK_VERSION,
};

/// PulseLock - On-device heart-pattern biometric authentication engine
#[derive(Parser)]
#[command(name = "pulselock")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSELOCK_VERSION)]
#[command(about = "Authenticate users by heart-pattern fingerprint", long_about = None)]
struct Cli {
    /// Directory holding per-user vault files
    #[arg(long, default_value = ".pulselock")]
    store_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and store a baseline fingerprint from captured samples
    Enroll {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Sample input path, NDJSON of heart-rate samples (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Security level for the enrollment
        #[arg(long, default_value = "medium")]
        security_level: LevelArg,
    },

    /// Run one authentication attempt against the stored baseline
    Verify {
        /// User identifier
        #[arg(short, long)]
        user: String,

        /// Sample input path, NDJSON of heart-rate samples (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show lockout state and recent attempts for a user
    Status {
        /// User identifier
        #[arg(short, long)]
        user: String,
    },

    /// Administratively clear a user's lockout state
    Reset {
        /// User identifier
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Low,
    Medium,
    High,
    Maximum,
}

impl From<LevelArg> for SecurityLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Low => SecurityLevel::Low,
            LevelArg::Medium => SecurityLevel::Medium,
            LevelArg::High => SecurityLevel::High,
            LevelArg::Maximum => SecurityLevel::Maximum,
        }
    }
}

/// Plain-file store standing in for the host platform's secure storage.
/// Blobs land unencrypted on disk; production embedders supply their own
/// [`SecureStore`] backed by the OS credential store.
struct FileStore {
    dir: PathBuf,
    io: Mutex<()>,
}

impl FileStore {
    fn new(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)
            .map_err(|e| StoreError::Unavailable(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            io: Mutex::new(()),
        })
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        // Keep vault names filesystem-safe
        let safe: String = user_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.vault.json", safe))
    }
}

impl SecureStore for FileStore {
    fn get(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        match fs::read(self.path_for(user_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    fn put(&self, user_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        fs::write(self.path_for(user_id), blob).map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn delete(&self, user_id: &str) -> Result<(), StoreError> {
        let _io = self.io.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(self.path_for(user_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

/// Read an NDJSON sample stream from a file or stdin
fn read_samples(input: &Path) -> Result<SampleWindow, String> {
    let reader: Box<dyn BufRead> = if input == Path::new("-") {
        if atty::is(atty::Stream::Stdin) {
            return Err("refusing to read samples from an interactive terminal; pipe NDJSON or pass a file".to_string());
        }
        Box::new(io::BufReader::new(io::stdin()))
    } else {
        let file = fs::File::open(input).map_err(|e| format!("cannot open {}: {}", input.display(), e))?;
        Box::new(io::BufReader::new(file))
    };

    let mut samples: Vec<HeartRateSample> = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("read error: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: HeartRateSample = serde_json::from_str(&line)
            .map_err(|e| format!("line {}: invalid sample: {}", lineno + 1, e))?;
        samples.push(sample);
    }

    SampleWindow::new(samples).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let store = match FileStore::new(&cli.store_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Enroll {
            user,
            input,
            security_level,
        } => {
            let config = EngineConfig {
                security_level: security_level.into(),
                ..Default::default()
            };
            let engine = match PulseLockEngine::new(Box::new(store), config) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let window = match read_samples(&input) {
                Ok(window) => window,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match engine.enroll(&user, &window, Utc::now()) {
                Ok(fingerprint) => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "enrolled": user,
                            "fingerprint_id": fingerprint.id,
                            "confidence": fingerprint.confidence,
                        })
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("enrollment failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Verify { user, input } => {
            let engine = match PulseLockEngine::new(Box::new(store), EngineConfig::default()) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let window = match read_samples(&input) {
                Ok(window) => window,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let decision = engine.authenticate(&user, &window, Utc::now());
            match serde_json::to_string_pretty(&decision) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            if matches!(decision, AuthDecision::Accepted { .. }) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }

        Commands::Status { user } => {
            let engine = match PulseLockEngine::new(Box::new(store), EngineConfig::default()) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match engine.lockout_state(&user) {
                Ok(Some(state)) => {
                    match serde_json::to_string_pretty(&state) {
                        Ok(json) => println!("{}", json),
                        Err(e) => {
                            eprintln!("error: {}", e);
                            return ExitCode::FAILURE;
                        }
                    }
                    ExitCode::SUCCESS
                }
                Ok(None) => {
                    eprintln!("no record for user {}", user);
                    ExitCode::FAILURE
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Reset { user } => {
            let engine = match PulseLockEngine::new(Box::new(store), EngineConfig::default()) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match engine.reset_lockout(&user) {
                Ok(()) => {
                    println!("lockout reset for {}", user);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
