fn main() -> anyhow::Result<()> {
    offline_notes::cli::run()
}
