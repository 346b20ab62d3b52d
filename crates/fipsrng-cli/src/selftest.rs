//! Run the power-up self-tests.

use fipsrng_crypto::fips::FipsModule;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut module = FipsModule::new();
    module.run_self_tests()?;
    println!("self-tests passed: {:?}", module.state());
    Ok(())
}
