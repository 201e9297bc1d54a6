use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tabuip::solver::{SolverOption, Verbose};
use tabuip::{InstanceData, Model, TimeKeeper, VariableID};

/// Metaheuristic solver for pure integer programs in MPS format.
#[derive(Debug, Parser)]
#[command(name = "mps_solver")]
struct Args {
    /// MPS instance to solve (optionally gzipped)
    mps_file: PathBuf,

    /// JSON option file
    #[arg(short = 'p', value_name = "OPTION_FILE")]
    option_file: Option<PathBuf>,

    /// Initial solution file (`name value` per line)
    #[arg(short = 'i', value_name = "INITIAL_SOLUTION_FILE")]
    initial_solution_file: Option<PathBuf>,

    /// Keep only the listed variables mutable; fix the rest
    #[arg(short = 'm', value_name = "MUTABLE_VARIABLE_FILE")]
    mutable_variable_file: Option<PathBuf>,

    /// Fix the listed variables to the given values
    #[arg(short = 'f', value_name = "FIXED_VARIABLE_FILE")]
    fixed_variable_file: Option<PathBuf>,

    /// Treat the listed constraints as user-defined selections
    #[arg(short = 's', value_name = "SELECTION_CONSTRAINT_FILE")]
    selection_constraint_file: Option<PathBuf>,

    /// Register the listed variable pairs as flippable
    #[arg(short = 'x', value_name = "FLIPPABLE_VARIABLE_PAIR_FILE")]
    flippable_variable_pair_file: Option<PathBuf>,

    /// Minimum number of shared constraints for automatic flippable-pair
    /// extraction
    #[arg(short = 'c', value_name = "MINIMUM_COMMON_ELEMENT", default_value_t = 5)]
    minimum_common_element: usize,

    /// Interpret continuous columns as integer instead of rejecting them
    #[arg(long)]
    accept_continuous: bool,

    /// Scan binary variables for flippable pairs before solving
    #[arg(long)]
    extract_flippable_variable_pairs: bool,

    /// Count MPS loading time against the time limit
    #[arg(long)]
    include_mps_loading_time: bool,

    /// Write the loaded instance as <name>.json and continue
    #[arg(long)]
    export_json_instance: bool,

    /// Force minimization regardless of the MPS OBJSENSE
    #[arg(long, visible_aliases = ["minimize", "min"], conflicts_with = "maximization")]
    minimization: bool,

    /// Force maximization regardless of the MPS OBJSENSE
    #[arg(long, visible_aliases = ["maximize", "max"])]
    maximization: bool,
}

fn init_logging(verbose: Verbose) {
    let filter = match verbose {
        Verbose::Off => "error",
        Verbose::Warning => "warn",
        Verbose::Outer => "info",
        Verbose::Inner => "debug",
        Verbose::Full => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn apply_variable_files(model: &mut Model, args: &Args) -> anyhow::Result<()> {
    if let Some(path) = &args.initial_solution_file {
        let pairs = tabuip::read_solution_file(path)
            .with_context(|| format!("reading initial solution {}", path.display()))?;
        for (name, value) in pairs {
            match model.variable_by_name(&name) {
                Some(id) => model.variable_mut(id).set_value_if_mutable(value),
                None => tracing::warn!(%name, "initial solution names an unknown variable"),
            }
        }
    }

    if let Some(path) = &args.fixed_variable_file {
        let pairs = tabuip::read_solution_file(path)
            .with_context(|| format!("reading fixed variables {}", path.display()))?;
        for (name, value) in pairs {
            match model.variable_by_name(&name) {
                Some(id) => model.variable_mut(id).fix_to(value),
                None => tracing::warn!(%name, "fixed variable file names an unknown variable"),
            }
        }
    }

    if let Some(path) = &args.mutable_variable_file {
        let names = tabuip::read_name_list_file(path)
            .with_context(|| format!("reading mutable variables {}", path.display()))?;
        let mut keep = std::collections::HashSet::new();
        for name in names {
            match model.variable_by_name(&name) {
                Some(id) => {
                    keep.insert(id);
                }
                None => tracing::warn!(%name, "mutable variable file names an unknown variable"),
            }
        }
        let all: Vec<VariableID> = model.variables().iter().map(|v| v.id()).collect();
        for id in all {
            if !keep.contains(&id) && model.variable(id).is_mutable() {
                let value = model.variable(id).value();
                model.variable_mut(id).fix_to(value);
            }
        }
    }

    if let Some(path) = &args.selection_constraint_file {
        let names = tabuip::read_name_list_file(path)
            .with_context(|| format!("reading selection constraints {}", path.display()))?;
        for name in names {
            match model.constraint_by_name(&name) {
                Some(id) => model.constraint_mut(id).set_is_user_defined_selection(true),
                None => {
                    tracing::warn!(%name, "selection file names an unknown constraint")
                }
            }
        }
    }

    if let Some(path) = &args.flippable_variable_pair_file {
        let pairs = tabuip::read_name_pair_file(path)
            .with_context(|| format!("reading flippable pairs {}", path.display()))?;
        let mut resolved = Vec::new();
        for (a, b) in pairs {
            match (model.variable_by_name(&a), model.variable_by_name(&b)) {
                (Some(a), Some(b)) => resolved.push((a, b)),
                _ => tracing::warn!(%a, %b, "flippable pair names an unknown variable"),
            }
        }
        model.register_flippable_pairs(&resolved);
    }
    Ok(())
}

/// Register every pair of mutable binary variables that share at least
/// `minimum_common_element` binary rows with unit coefficients as
/// flippable.
fn extract_flippable_pairs(model: &mut Model, minimum_common_element: usize) {
    let binaries = model.variable_reference().binary.clone();
    let mut pairs = Vec::new();
    for (index, &a) in binaries.iter().enumerate() {
        for &b in &binaries[index + 1..] {
            let shared = model
                .variable(a)
                .binary_unit_constraints()
                .iter()
                .filter(|c| model.variable(b).binary_unit_constraints().contains(c))
                .count();
            if shared >= minimum_common_element {
                pairs.push((a, b));
            }
        }
    }
    tracing::info!(pairs = pairs.len(), "flippable pairs extracted");
    model.register_flippable_pairs(&pairs);
}

fn run(args: Args) -> anyhow::Result<()> {
    let option = match &args.option_file {
        Some(path) => SolverOption::load_file(path)
            .with_context(|| format!("reading option file {}", path.display()))?,
        None => SolverOption::default(),
    };
    init_logging(option.output.verbose);

    let loading_keeper = TimeKeeper::new();
    let mut model = tabuip::mps::load_file(&args.mps_file, args.accept_continuous)
        .with_context(|| format!("loading MPS file {}", args.mps_file.display()))?;
    let loading_time = loading_keeper.clock();
    tracing::info!(
        variables = model.number_of_variables(),
        constraints = model.constraints().len(),
        loading_time,
        "instance loaded"
    );

    let mut option = option;
    if args.include_mps_loading_time {
        option.general.time_max = (option.general.time_max - loading_time).max(0.0);
    }

    if args.minimization {
        model.objective_mut().set_is_minimization(true);
    } else if args.maximization {
        model.objective_mut().set_is_minimization(false);
    }

    apply_variable_files(&mut model, &args)?;
    model.setup();

    if args.extract_flippable_variable_pairs {
        extract_flippable_pairs(&mut model, args.minimum_common_element);
    }

    if args.export_json_instance {
        let name = if model.name().is_empty() {
            "instance".to_string()
        } else {
            model.name().to_string()
        };
        tabuip::write_json(&InstanceData::from_model(&model), format!("{name}.json"))?;
    }

    let store_feasible = option.output.is_enabled_store_feasible_solutions;
    let result = tabuip::solver::solve(&mut model, option)?;

    println!(
        "status: {}",
        if result.status.is_found_feasible_solution {
            1
        } else {
            0
        }
    );
    println!("objective: {}", result.solution.objective);
    println!("total violation: {}", result.solution.total_violation);

    tabuip::write_json(&result.solution, "incumbent.json")?;
    tabuip::write_solution_file(&result.solution, "incumbent.sol")?;
    tabuip::write_json(&result.status, "status.json")?;
    if store_feasible {
        tabuip::write_json(&result.feasible_solutions, "feasible.json")?;
    }
    Ok(())
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            // Usage problems exit with 1; --help and --version exit clean.
            let _ = error.print();
            let code = if error.use_stderr() { 1 } else { 0 };
            std::process::exit(code);
        }
    };
    if let Err(error) = run(args) {
        eprintln!("Error: {error:#}");
        std::process::exit(2);
    }
}
