fn main() -> anyhow::Result<()> {
    metagen::cli::run_cli()
}
