use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use clap::{clap_app, ArgMatches};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, Level};
use sspp::environments::{commute, frozen_lake, frozen_lake::Move};
use sspp::learning::sampling::Environment;
use sspp::learning::{monte_carlo::monte_carlo, q_learning::q_learn, value_iteration::value_iteration};
use sspp::model_checking::sspp::{simulate, RunOutcome};
use sspp::{guaranteed_short_path, read_config_json, read_model_json, reachability_optimal_policy};
use sspp::{Error, Label, Policy, Pruning, Result, SolverConfig, UnfoldedAction, ValueTable, MDP};

/// A model together with the state runs start from and the target state
struct Problem<S: Label, A: Label> {
    mdp: MDP<S, A>,
    start: S,
    end: S,
    /// Pretty printer for policies of grid models
    render: Option<Box<dyn Fn(&Policy<S, A>) -> String>>,
}

fn main() {
    let matches = clap_app!(sspp =>
        (version: "0.1")
        (author: "Thomas Robinson")
        (about: "Reachability, percentile shortest path and expected reward policies for MDPs")
        (@setting SubcommandRequiredElseHelp)
        (@arg VERBOSE: -v --verbose +multiple +global "Level of verbosity, repeat for more: \
        -v info, -vv debugging, -vvv every update")
        (@arg CONFIG: -c --config [PATH] +global "Solver settings in json, missing fields take defaults")
        (@arg mPATH: --mpath [PATH] +global "MDP model in the two-table format e.g.
            {
              \"state_actions\": {\"home\": {\"bike\": -45.0}, \"work\": {\"done\": 0.0}},
              \"action_states\": {\"bike\": {\"work\": 1.0}, \"done\": {\"work\": 1.0}},
              \"start\": \"home\",
              \"end\": \"work\"
            }
           ")
        (@arg ENV: --env [NAME] +global "Built in model: commute, frozenlake4 or frozenlake8")
        (@arg OUT: -o --out [PATH] +global "Write the policy as csv to a file instead of stdout")
        (@subcommand reach =>
            (about: "Maximal probability of reaching the end state, and a policy attaining it")
        )
        (@subcommand sspp =>
            (about: "Reach the end state within a cost budget with a guaranteed probability")
            (@arg LENGTH: -l --length <COST> "Cost budget, a budget of 60 guarantees an accumulated reward of at least -60")
            (@arg PROBA: -p --proba [P] default_value("0") "Only keep states succeeding with at least this probability")
            (@arg PRUNING: --pruning [MODE] "threshold or shortest_path, overrides the config file")
            (@arg DOT: --dot [PATH] "Write the unfolded MDP in graphviz format")
            (@arg RUNS: --runs [N] default_value("0") "Simulate the policy this many times")
            (@arg SEED: --seed [N] "Random seed for the simulated runs")
        )
        (@subcommand learn =>
            (about: "Expected reward policies")
            (@arg ALGO: -a --algo [ALGO] default_value("vi") "vi - value iteration\
            q - Q-learning
            mc - Monte Carlo control
            ")
            (@arg EPISODES: -e --episodes [N] "Episodes, or sweeps for value iteration")
            (@arg SEED: --seed [N] "Random seed")
        )
    ).get_matches();

    let level = match matches.occurrences_of("VERBOSE") {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&matches) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let mut config: SolverConfig = match matches.value_of("CONFIG") {
        Some(path) => read_config_json(path)?,
        None => SolverConfig::default()
    };
    let (name, sub) = matches.subcommand();
    let sub = match sub {
        Some(s) => s,
        None => return Ok(())
    };
    if let Some(mode) = sub.value_of("PRUNING") {
        config.unfold.pruning = match mode {
            "threshold" => Pruning::Threshold,
            "shortest_path" => Pruning::ShortestPath,
            _ => return Err(cli_error(format!("unknown pruning mode {}", mode)))
        };
    }
    if let Some(n) = sub.value_of("EPISODES") {
        config.learner.episodes = parse(n, "episodes")?;
    }
    if let Some(s) = sub.value_of("SEED") {
        config.seed = Some(parse(s, "seed")?);
    }
    let out = matches.value_of("OUT").or_else(|| sub.value_of("OUT"));

    match (matches.value_of("mPATH").or_else(|| sub.value_of("mPATH")),
           matches.value_of("ENV").or_else(|| sub.value_of("ENV"))) {
        (Some(path), _) => {
            info!(path, "reading model");
            let spec = read_model_json(path)?;
            let problem = Problem { mdp: spec.build()?, start: spec.start, end: spec.end, render: None };
            dispatch(name, sub, &problem, &config, out)
        }
        (None, Some("commute")) | (None, None) => {
            let problem = Problem {
                mdp: commute::commute()?,
                start: commute::START.to_string(),
                end: commute::END.to_string(),
                render: None,
            };
            dispatch(name, sub, &problem, &config, out)
        }
        (None, Some(env)) if env == "frozenlake4" || env == "frozenlake8" => {
            let lake = frozen_lake::frozen_lake(env == "frozenlake8");
            let problem = Problem {
                mdp: lake.mdp.clone(),
                start: lake.start,
                end: lake.goal,
                render: Some(Box::new(move |policy: &Policy<usize, Move>| lake.render(policy))),
            };
            dispatch(name, sub, &problem, &config, out)
        }
        (None, Some(other)) => Err(cli_error(format!("unknown environment {}", other)))
    }
}

fn dispatch<S, A>(name: &str, sub: &ArgMatches, problem: &Problem<S, A>, config: &SolverConfig, out: Option<&str>)
    -> Result<()>
    where S: Label + Display, A: Label + Display
{
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy()
    };
    let targets: BTreeSet<S> = vec![problem.end.clone()].into_iter().collect();
    let mut records: Vec<Vec<String>> = Vec::new();
    match name {
        "reach" => {
            let (policy, x) = reachability_optimal_policy(&problem.mdp, &targets)?;
            println!("probability of reaching {} from {}: {:.6}", problem.end, problem.start,
                     x.get(&problem.start).copied().unwrap_or(0.0));
            records.push(vec!["state".into(), "probability".into(), "action".into()]);
            for (s, p) in x.iter() {
                let action = policy.get(s).map(|a| a.to_string()).unwrap_or_default();
                records.push(vec![s.to_string(), p.to_string(), action]);
            }
        }
        "sspp" => {
            let length = budget_length(parse(sub.value_of("LENGTH").unwrap_or("0"), "length")?)?;
            let proba: f64 = parse(sub.value_of("PROBA").unwrap_or("0"), "proba")?;
            let g = guaranteed_short_path(&problem.mdp, &problem.start, &targets, length, proba, &config.unfold)?;
            println!("probability of reaching {} from {} with cost at most {}: {:.6}",
                     problem.end, problem.start, -length, g.initial_probability());
            if let Some(path) = sub.value_of("DOT") {
                let mut file = File::create(path)?;
                file.write_all(g.unfolded.mdp.to_dot().as_bytes())?;
                info!(path, "unfolded MDP written");
            }
            let runs: usize = parse(sub.value_of("RUNS").unwrap_or("0"), "runs")?;
            if runs > 0 {
                let (mut reached, mut failed, mut timed_out) = (0, 0, 0);
                for _ in 0..runs {
                    match simulate(&problem.mdp, &g, &problem.start, &targets, 10_000, &mut rng)? {
                        RunOutcome::Reached { .. } => reached += 1,
                        RunOutcome::Failed { .. } => failed += 1,
                        RunOutcome::TimedOut => timed_out += 1,
                    }
                }
                println!("runs: {} reached, {} failed, {} timed out", reached, failed, timed_out);
            }
            if let Some(render) = &problem.render {
                println!("{}", render(&g.project_policy()));
            }
            records.push(vec!["state".into(), "budget".into(), "probability".into(), "action".into()]);
            for (s, a) in g.policy.iter() {
                let state = s.state().map(|s| s.to_string()).unwrap_or_else(|| "BOT".to_string());
                let budget = s.value().map(|v| v.to_string()).unwrap_or_default();
                let p = g.x.get(s).copied().unwrap_or(0.0);
                let action = match a {
                    UnfoldedAction::Take(a) => a.to_string(),
                    UnfoldedAction::Loop => "loop".to_string()
                };
                records.push(vec![state, budget, p.to_string(), action]);
            }
        }
        "learn" => {
            let algo = sub.value_of("ALGO").unwrap_or("vi");
            let learner = &config.learner;
            let env = Environment::new(&problem.mdp, &problem.start, &problem.end);
            let (values, policy) = match algo {
                "vi" => value_iteration(&problem.mdp, learner.gamma, learner.episodes),
                "q" | "mc" => {
                    let learned = if algo == "q" {
                        q_learn(&env, learner, &mut rng)?
                    } else {
                        monte_carlo(&env, learner, &mut rng)?
                    };
                    println!("{} of {} episodes truncated", learned.truncated_episodes(), learned.episodes.len());
                    let values: ValueTable<S> = learned.q.iter()
                        .filter(|(_, q)| !q.is_empty())
                        .map(|(s, q)| (s.clone(), q.values().cloned().fold(f64::NEG_INFINITY, f64::max)))
                        .collect();
                    (values, learned.policy)
                }
                other => return Err(cli_error(format!("unknown algorithm {}", other)))
            };
            if let Some(render) = &problem.render {
                println!("{}", render(&policy));
            }
            records.push(vec!["state".into(), "value".into(), "action".into()]);
            for (s, v) in values.iter() {
                let action = policy.get(s).map(|a| a.to_string()).unwrap_or_default();
                records.push(vec![s.to_string(), v.to_string(), action]);
            }
        }
        _ => return Ok(())
    }
    write_records(&records, out)
}

fn write_records(records: &[Vec<String>], out: Option<&str>) -> Result<()> {
    let sink: Box<dyn Write> = match out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(std::io::stdout())
    };
    let mut wtr = csv::Writer::from_writer(sink);
    for record in records.iter() {
        wtr.write_record(record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn parse<T: std::str::FromStr>(value: &str, name: &'static str) -> Result<T> {
    value.parse().map_err(|_| cli_error(format!("could not parse {} from {:?}", name, value)))
}

fn cli_error(message: String) -> Error {
    Error::Cli(message)
}

/// Budgets are given as positive costs on the command line, the solver takes a lower bound on
/// the accumulated reward
fn budget_length(cost: f64) -> Result<f64> {
    if cost < 0.0 || cost.is_nan() {
        return Err(Error::InvalidParameter { name: "length", value: cost });
    }
    Ok(-cost)
}
