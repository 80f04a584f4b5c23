use clap::Parser;
use shelfrank::cli::{Cli, Commands, parse_error_exit_code};
use shelfrank::core::error::{RankError, exit_code_for};
use shelfrank::infra::logging;

fn main()
{
    let cli = match Cli::try_parse()
    {
        Ok(cli) => cli,
        Err(err) =>
        {
            let code = parse_error_exit_code(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };
    logging::init(cli.verbose, cli.no_color);

    // Build a context once, pass everywhere
    let ctx = cli.context();

    let result = match cli.command
    {
        Commands::Add(args) => shelfrank::cli_ext::rank_cmd::add(args, &ctx),
        Commands::Rerank(args) => shelfrank::cli_ext::rank_cmd::rerank(args, &ctx),
        Commands::Remove(args) => shelfrank::cli_ext::rank_cmd::remove(args, &ctx),
        Commands::Import(args) => shelfrank::cli_ext::rank_cmd::import(args, &ctx),
        Commands::List(args) => shelfrank::cli_ext::rank_cmd::list(args, &ctx),
        Commands::Check(args) => shelfrank::cli_ext::rank_cmd::check(args, &ctx),
        Commands::Init(args) => shelfrank::infra::config::init(args, &ctx),
        Commands::Completions(args) => shelfrank::completion::run(args, &ctx),
        Commands::Man(args) => shelfrank::completion::man(args, &ctx),
    };

    if let Err(err) = result
    {
        let code = match err.downcast_ref::<RankError>()
        {
            Some(rank) =>
            {
                eprintln!("{:?}", miette::Report::new(rank.clone()));
                exit_code_for(rank)
            }
            None =>
            {
                eprintln!("Error: {err:#}");
                1
            }
        };
        std::process::exit(code);
    }
}
