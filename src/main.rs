fn main() -> anyhow::Result<()> {
    newsdesk::cli::run()
}
