fn main() -> anyhow::Result<()> {
    tariffguard_lib::run()
}
