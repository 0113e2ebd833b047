fn main() -> anyhow::Result<()> {
    screen_roast_lib::run()
}
