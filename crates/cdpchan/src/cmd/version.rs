use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("cdpchan {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: cdpchan");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("CDPCHAN_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "wire: signature=0x{:04x} version={}",
        cdpchan_frame::SIGNATURE,
        cdpchan_frame::VERSION
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
