//! Dumps the SSA of a small built-in program together with the variables
//! the template generators pick for it.
//!
//! Run with: `cargo run --example ssa_dump`
//! With options: `cargo run --example ssa_dump -- --program nested --unwind 2`

use clap::{Parser, ValueEnum};
use log::info;

use templ_rs::domains::TemplateDomain;
use templ_rs::expr::{Expr, Sort, Symbol};
use templ_rs::generators::{RankingGenerator, SummaryGenerator};
use templ_rs::goto::{GotoFunction, Instruction, SymbolTable};
use templ_rs::options::AnalysisConfig;
use templ_rs::ssa::{LocalSsa, LoopUnwinder};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Program {
    /// while (x > 0) x = x - 1;
    Countdown,
    /// x = 0; while (x < 10) x = x + 1;
    CountUp,
    /// while (x > 0) { y = x; while (y > 0) y = y - 1; x = x - 1; }
    Nested,
}

#[derive(Parser, Debug)]
#[command(name = "ssa_dump")]
#[command(about = "Print the SSA and template variables of a sample program")]
struct Args {
    /// Program to translate
    #[arg(short, long, value_enum, default_value_t = Program::Countdown)]
    program: Program,

    /// Unwind the outermost loop this many times
    #[arg(short, long, default_value_t = 0)]
    unwind: u32,

    /// Classify variables for a backward analysis
    #[arg(short, long)]
    backward: bool,
}

fn v(name: &str) -> Expr {
    Expr::var(Symbol::int(name))
}

fn program(which: Program) -> GotoFunction {
    let (x, y) = (Symbol::int("x"), Symbol::int("y"));
    match which {
        Program::Countdown => GotoFunction::new(
            vec![x.clone()],
            vec![
                Instruction::goto_if(v("x").le(Expr::int(0)), 3),
                Instruction::assign(x, v("x").sub(Expr::int(1))),
                Instruction::goto(0),
                Instruction::EndFunction,
            ],
        ),
        Program::CountUp => GotoFunction::new(
            vec![],
            vec![
                Instruction::assign(x.clone(), Expr::int(0)),
                Instruction::goto_if(v("x").ge(Expr::int(10)), 4),
                Instruction::assign(x, v("x").add(Expr::int(1))),
                Instruction::goto(1),
                Instruction::EndFunction,
            ],
        ),
        Program::Nested => GotoFunction::new(
            vec![x.clone()],
            vec![
                Instruction::goto_if(v("x").le(Expr::int(0)), 7),
                Instruction::assign(y.clone(), v("x")),
                Instruction::goto_if(v("y").le(Expr::int(0)), 5),
                Instruction::assign(y, v("y").sub(Expr::int(1))),
                Instruction::goto(2),
                Instruction::assign(x, v("x").sub(Expr::int(1))),
                Instruction::goto(0),
                Instruction::EndFunction,
            ],
        ),
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let args = Args::parse();
    let function = program(args.program);
    let name = format!("{:?}", args.program).to_lowercase();

    println!("── GOTO program ──\n");
    print!("{}", function);
    println!();

    let mut ssa = LocalSsa::build(&name, &function, &SymbolTable::new())?;
    if args.unwind > 0 {
        let head = match ssa.loops().iter().map(|l| l.head).min() {
            Some(head) => head,
            None => color_eyre::eyre::bail!("'{}' has no loop to unwind", name),
        };
        let mut unwinder = LoopUnwinder::new(&mut ssa);
        for _ in 0..args.unwind {
            let enable = unwinder.unwind(head)?;
            info!("unwound the loop at {} (enabled by {})", head, enable);
        }
    }

    println!("── SSA ──\n");
    print!("{}", ssa);
    println!();

    println!("── Loops ──\n");
    for l in ssa.loops() {
        println!("{} -> {} (depth {})", l.back_edge, l.head, ssa.depth(l.head));
    }
    println!();

    let summary = SummaryGenerator::new(&ssa, !args.backward);
    println!(
        "── {} template variables ──\n",
        if summary.is_forward() { "Forward" } else { "Backward" }
    );
    for spec in summary.var_specs() {
        println!(
            "({}) {} -> {} when {} / {}",
            spec.kind, spec.var, spec.post_var, spec.pre_guard, spec.post_guard
        );
    }
    println!();

    let candidates: Vec<Expr> = ssa
        .objects()
        .filter(|o| o.sort() == Sort::Int)
        .map(|o| Expr::var(o).ge(Expr::int(0)))
        .collect();
    let predicates = summary.predicate_domain(0, &candidates, &AnalysisConfig::default());
    println!("── Predicate rows ──\n");
    for row in predicates.rows() {
        println!("{}", row);
    }
    println!();

    println!("── Ranking variables ──\n");
    for spec in RankingGenerator::new(&ssa).var_specs() {
        println!("{} -> {} when {}", spec.var, spec.post_var, spec.pre_guard);
    }

    Ok(())
}
