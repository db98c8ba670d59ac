use anyhow::anyhow;
use clap::Parser;
use const_format::concatcp;
use rand::seq::SliceRandom;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::env;
use std::fs::File;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT);

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
    ("ROCKET_PROFILE", "release"),
];

#[rustfmt::skip]
const CANDIDATES: &[&str] = &[
    "Alice",
    "Carol",
    "Dave",
    "Eve",
    "Fred",
    "Grace",
    "Henry",
    "Irene",
    "Joe",
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Connect to a remote server at this URL instead of running a local one.
    #[arg(long)]
    remote: Option<String>,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many voters each thread registers.
    #[arg(long, default_value_t = 50)]
    voters_per_thread: usize,

    /// Run the consistency auditor over the local database afterwards.
    #[arg(long)]
    audit: bool,
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// Build the server and point it at a fresh database in `db_dir`.
fn setup_deps(db_dir: &Path) -> anyhow::Result<PathBuf> {
    // Ensure the optimised build is up-to-date.
    Command::new("cargo")
        .args(["build", "--release", "--bin", "voting-backend"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))?;

    let db_path = db_dir.join("benchmark.db");
    env::set_var("ROCKET_DB_PATH", &db_path);
    for (var, val) in ROCKET_ENV {
        env::set_var(var, val);
    }

    Ok(db_path)
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start the server and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/voting-backend")
        .stdout(logfile)
        .spawn()?;

    #[derive(Deserialize)]
    struct Liveness {
        status: String,
    }

    // Wait for the server to be reachable.
    let client = Client::new();
    loop {
        let resp = client
            .get(url!(LOCAL_URL, "api/health"))
            .send()
            .and_then(Response::error_for_status);

        if let Ok(resp) = resp {
            match resp.json::<Liveness>() {
                Ok(Liveness { status }) if status == "ok" => break,
                other => {
                    terminate_child(&mut proc)?;
                    proc.wait()?;
                    return Err(anyhow!("Bad response: {:?}", other.map(|l| l.status)));
                }
            }
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(Duration::from_millis(50));
    }

    Ok(proc)
}

#[derive(Debug, Deserialize)]
struct Created {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CandidateTally {
    id: i64,
    votes: u64,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    total_votes: u64,
    by_candidate: Vec<CandidateTally>,
}

fn statistics(client: &Client, url: &str) -> anyhow::Result<Statistics> {
    Ok(client
        .get(url!(url, "api/votes/statistics"))
        .send()
        .and_then(Response::error_for_status)?
        .json()?)
}

/// Register the benchmark candidates and return their IDs.
fn setup_candidates(client: &Client, url: &str, tag: u32) -> anyhow::Result<Vec<i64>> {
    CANDIDATES
        .iter()
        .map(|name| {
            let candidate = json!({
                "name": format!("{name} {tag}"),
                "party": "Benchmark",
            });
            let Created { id } = client
                .post(url!(url, "api/candidates"))
                .json(&candidate)
                .send()
                .and_then(Response::error_for_status)?
                .json()?;
            Ok(id)
        })
        .collect()
}

/// Durations of each part of the voting process.
#[derive(Debug, Default)]
struct VoteTimings {
    register: Duration,
    cast: Duration,
}

impl AddAssign for VoteTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.register += rhs.register;
        self.cast += rhs.cast;
    }
}

/// What happened to one thread's voters.
#[derive(Debug, Default)]
struct Outcome {
    timings: VoteTimings,
    successes: u64,
    conflicts: u64,
    per_candidate: HashMap<i64, u64>,
}

impl AddAssign for Outcome {
    fn add_assign(&mut self, rhs: Self) {
        self.timings += rhs.timings;
        self.successes += rhs.successes;
        self.conflicts += rhs.conflicts;
        for (candidate, votes) in rhs.per_candidate {
            *self.per_candidate.entry(candidate).or_default() += votes;
        }
    }
}

/// Submit one vote, returning the candidate if it was accepted and `None` if
/// the voter had already voted.
fn cast_vote(
    client: &Client,
    url: &str,
    voter_id: i64,
    candidate_id: i64,
) -> anyhow::Result<Option<i64>> {
    let resp = client
        .post(url!(url, "api/votes"))
        .json(&json!({ "voter_id": voter_id, "candidate_id": candidate_id }))
        .send()?;
    match resp.status() {
        StatusCode::CREATED => Ok(Some(candidate_id)),
        StatusCode::CONFLICT => Ok(None),
        status => Err(anyhow!(
            "unexpected {status} voting for candidate {candidate_id}: {}",
            resp.text()?
        )),
    }
}

/// Register a voter, then have them vote twice at once. Exactly one vote
/// must be accepted.
fn vote_twice(
    client: &Client,
    url: &str,
    tag: u32,
    index: usize,
    candidates: &[i64],
) -> anyhow::Result<Outcome> {
    let pre_register = Instant::now();
    let voter = json!({
        "name": format!("Voter {tag}-{index}"),
        "email": format!("voter{index}.{tag}@benchmark.example"),
    });
    let Created { id: voter_id } = client
        .post(url!(url, "api/voters"))
        .json(&voter)
        .send()
        .and_then(Response::error_for_status)?
        .json()?;
    let register = pre_register.elapsed();

    let (first, second) = {
        let mut rng = rand::thread_rng();
        // Unwrap safe: there is always at least one candidate.
        (
            *candidates.choose(&mut rng).unwrap(),
            *candidates.choose(&mut rng).unwrap(),
        )
    };

    let pre_cast = Instant::now();
    let results = thread::scope(|s| {
        let a = s.spawn(|| cast_vote(client, url, voter_id, first));
        let b = s.spawn(|| cast_vote(client, url, voter_id, second));
        [a.join(), b.join()]
    });
    let cast = pre_cast.elapsed();

    let mut outcome = Outcome {
        timings: VoteTimings { register, cast },
        ..Default::default()
    };
    for result in results {
        match result.map_err(|_| anyhow!("vote thread panicked"))?? {
            Some(candidate) => {
                outcome.successes += 1;
                *outcome.per_candidate.entry(candidate).or_default() += 1;
            }
            None => outcome.conflicts += 1,
        }
    }
    if outcome.successes != 1 {
        return Err(anyhow!(
            "voter {voter_id} had {} accepted votes",
            outcome.successes
        ));
    }

    Ok(outcome)
}

/// Run the benchmark.
fn benchmark(
    url: &str,
    tag: u32,
    candidates: &[i64],
    num_threads: usize,
    voters_per_thread: usize,
) -> anyhow::Result<Outcome> {
    let end_val: usize = num_threads * voters_per_thread;

    let start = Instant::now();
    let outcome = thread::scope(|s| {
        let mut threads = Vec::with_capacity(num_threads);

        for start in (0..end_val).step_by(voters_per_thread.max(1)) {
            let t = s.spawn(move || {
                let client = Client::new();
                let mut outcome = Outcome::default();
                for index in start..(start + voters_per_thread) {
                    outcome += vote_twice(&client, url, tag, index, candidates)?;
                }
                Ok::<_, anyhow::Error>(outcome)
            });
            threads.push(t);
        }

        let mut outcome = Outcome::default();
        for t in threads {
            outcome += t.join().map_err(|_| anyhow!("thread panicked"))??;
        }
        Ok::<_, anyhow::Error>(outcome)
    })?;
    let total_duration = start.elapsed();

    let voters = end_val.max(1) as u32;
    let avg_register = outcome.timings.register / voters;
    let avg_cast = outcome.timings.cast / voters;
    let actual_votes_per_sec = outcome.successes as f64 / total_duration.as_secs_f64();

    println!("register: {:?}", avg_register);
    println!("cast (2 concurrent): {:?}", avg_cast);
    println!(
        "\naccepted {} votes, refused {} duplicates in {:?} ({:.2}/s)",
        outcome.successes, outcome.conflicts, total_duration, actual_votes_per_sec
    );

    Ok(outcome)
}

/// Check the server's statistics against what the benchmark saw.
fn verify(before: &Statistics, after: &Statistics, outcome: &Outcome) -> anyhow::Result<()> {
    let recorded = after.total_votes - before.total_votes;
    if recorded != outcome.successes {
        return Err(anyhow!(
            "server recorded {recorded} new votes but {} were accepted",
            outcome.successes
        ));
    }

    let sum: u64 = after.by_candidate.iter().map(|c| c.votes).sum();
    if sum != after.total_votes {
        return Err(anyhow!(
            "per-candidate votes sum to {sum} but the total is {}",
            after.total_votes
        ));
    }

    let previous: HashMap<i64, u64> = before.by_candidate.iter().map(|c| (c.id, c.votes)).collect();
    for (candidate, accepted) in &outcome.per_candidate {
        let now = after
            .by_candidate
            .iter()
            .find(|c| c.id == *candidate)
            .map_or(0, |c| c.votes);
        let gained = now - previous.get(candidate).copied().unwrap_or(0);
        if gained != *accepted {
            return Err(anyhow!(
                "candidate {candidate} gained {gained} votes but {accepted} were accepted"
            ));
        }
    }

    println!("statistics verified");
    Ok(())
}

/// Build the auditor and run it over the database.
fn audit(db_path: &Path) -> anyhow::Result<()> {
    Command::new("cargo")
        .args([
            "build",
            "--release",
            "--bin",
            "audit-cli",
            "--features",
            "audit",
        ])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("audit-cli build exited nonzero"))?;

    Command::new("./target/release/audit-cli")
        .arg(db_path)
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("audit failed"))?;

    Ok(())
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);
    if args.audit && args.remote.is_some() {
        return Err(anyhow!("--audit needs a local server"));
    }

    // If we're not connecting remotely, bring up a local server.
    let db_dir = TempDir::new()?;
    let mut proc: Option<Child> = None;
    let mut db_path = None;
    if args.remote.is_none() {
        db_path = Some(setup_deps(db_dir.path())?);
        let logfile = match args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    // Use a closure to ensure the cleanup below runs.
    let result = (|| {
        let client = Client::new();
        let tag = rand::random::<u32>();
        let candidates = setup_candidates(&client, url, tag)?;

        let before = statistics(&client, url)?;
        let outcome = benchmark(url, tag, &candidates, args.threads, args.voters_per_thread)?;
        let after = statistics(&client, url)?;
        verify(&before, &after, &outcome)
    })();

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }
    result?;

    if args.audit {
        if let Some(path) = &db_path {
            audit(path)?;
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
