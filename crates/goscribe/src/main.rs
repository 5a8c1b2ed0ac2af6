fn main() -> anyhow::Result<()> {
    goscribe::init();

    goscribe::cli::run()
}
