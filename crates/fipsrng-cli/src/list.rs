//! List registered DRBG algorithms with their strengths and flags.

use fipsrng_crypto::registry;

pub fn run(fips: bool) -> Result<(), Box<dyn std::error::Error>> {
    for line in lines(fips) {
        println!("{line}");
    }
    Ok(())
}

fn lines(fips: bool) -> Vec<String> {
    let names = if fips { registry::fips_names() } else { registry::names() };
    let mut out = vec![format!("{:<14} {:<20} {}", "ALGORITHM", "STRENGTHS", "FLAGS")];
    for name in names {
        let Some(desc) = registry::registry().find(name) else {
            continue;
        };
        let strengths = desc
            .strengths()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut flags = Vec::new();
        if desc.is_fips_approved() {
            flags.push("fips");
        }
        if desc.has_df() {
            flags.push("df");
        }
        if registry::is_excluded(name) {
            flags.push("excluded");
        }
        if desc.self_test().is_failed() {
            flags.push("disabled");
        }
        out.push(format!("{name:<14} {strengths:<20} {}", flags.join(" ")));
    }
    out
}
