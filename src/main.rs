use clap::{arg,crate_version,Command};
use prefixpress::{huffman, lz78};

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();

    let long_help =
"Examples:
---------
Compress:      `prefixpress compress -m huff -i my_expanded -o my_compressed`
Expand:        `prefixpress expand -m huff -i my_compressed -o my_expanded`";

    let methods = ["huff","lz78","lz78-hash"];

    let mut main_cmd = Command::new("prefixpress")
        .about("Compress and expand with prefix code kernels")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("compress a file"));

        main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-m --method <METHOD> "compression algorithm").required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let dat = std::fs::read(path_in)?;
        let compressed: Vec<u8> = match method.as_str() {
            "huff" => huffman::compress_slice(&dat)?,
            "lz78" => lz78::compress_slice(&dat,lz78::TrieBackend::BinarySorted)?,
            "lz78-hash" => lz78::compress_slice(&dat,lz78::TrieBackend::Hash)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        std::fs::write(path_out,compressed)?;
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let dat = std::fs::read(path_in)?;
        let expanded: Vec<u8> = match method.as_str() {
            "huff" => huffman::expand_slice(&dat)?,
            "lz78" | "lz78-hash" => lz78::expand_slice(&dat)?,
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
        std::fs::write(path_out,expanded)?;
    }

    Ok(())
}
