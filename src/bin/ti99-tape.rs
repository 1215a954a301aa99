use std::env;
use std::fs;
use std::process;

use ti99_tape::basic;
use ti99_tape::profile::DecoderProfile;
use ti99_tape::tape::constants::SAMPLE_RATE;
use ti99_tape::tape::{TapeDecoder, TapeEncoder};
use ti99_tape::tifiles;
use ti99_tape::wav;

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  ti99-tape decode <input.wav> [options]   Decode tape audio to .dat files");
    eprintln!("      --profile P    decoder profile name or JSON file ('?' lists profiles)");
    eprintln!("      --channel N    input channel to decode (default 0)");
    eprintln!("      --prefix S     output filename prefix (default 'tape_')");
    eprintln!("  ti99-tape encode <input.dat> <output.wav> [--hpf]");
    eprintln!("                                           Encode data as tape audio");
    eprintln!("  ti99-tape list <image.dat>               List a BASIC program image");
    eprintln!("  ti99-tape wrap <dump.dat> [--name N]     Wrap a dump in a TIFILES container");
    #[cfg(feature = "audio-live")]
    {
        eprintln!();
        eprintln!("  With no input file, 'decode --seconds S' records from the microphone;");
        eprintln!("  with no output file, 'encode' plays through the speaker.");
    }
    process::exit(1);
}

/// Split argv into positional arguments and `--flag value` / `--flag` pairs.
fn split_args(args: &[String]) -> (Vec<&str>, Vec<(&str, Option<&str>)>) {
    let mut positional = Vec::new();
    let mut flags = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if let Some(name) = arg.strip_prefix("--") {
            let takes_value = !matches!(name, "hpf");
            if takes_value && i + 1 < args.len() {
                flags.push((name, Some(args[i + 1].as_str())));
                i += 2;
            } else {
                flags.push((name, None));
                i += 1;
            }
        } else {
            positional.push(arg);
            i += 1;
        }
    }
    (positional, flags)
}

fn flag_value<'a>(flags: &[(&str, Option<&'a str>)], name: &str) -> Option<&'a str> {
    flags.iter().find(|(n, _)| *n == name).and_then(|(_, v)| *v)
}

fn load_profile(arg: &str) -> Result<DecoderProfile, Box<dyn std::error::Error>> {
    if arg.ends_with(".json") {
        let text = fs::read_to_string(arg)?;
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(DecoderProfile::named(arg)?)
    }
}

fn cmd_decode(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (positional, flags) = split_args(args);

    let profile_arg = flag_value(&flags, "profile").unwrap_or("peak1");
    if profile_arg == "?" {
        println!("Available profiles:");
        for (name, description) in DecoderProfile::builtin() {
            println!("  {} - {}", name, description);
        }
        return Ok(());
    }
    let profile = load_profile(profile_arg)?;
    let channel: usize = flag_value(&flags, "channel").unwrap_or("0").parse()?;
    let prefix = flag_value(&flags, "prefix").unwrap_or("tape_");

    let samples = match positional.first() {
        Some(path) => {
            let (samples, rate) = wav::read_wav(path, channel)?;
            if rate != SAMPLE_RATE {
                log::warn!(
                    "input sample rate {} differs from the tape rate {}; \
                     symbol timing will be off by the same ratio",
                    rate,
                    SAMPLE_RATE
                );
            }
            samples
        }
        #[cfg(feature = "audio-live")]
        None => {
            let seconds: f32 = flag_value(&flags, "seconds")
                .ok_or("live capture needs --seconds")?
                .parse()?;
            println!("Recording {:.1}s at {} Hz...", seconds, SAMPLE_RATE);
            ti99_tape::live::record_samples(seconds, SAMPLE_RATE)?
        }
        #[cfg(not(feature = "audio-live"))]
        None => usage(),
    };

    let mut decoder = TapeDecoder::new(profile);
    let programs = decoder.decode(&samples);

    for (i, program) in programs.iter().enumerate() {
        let filename = format!("{}{:03}.dat", prefix, i);
        fs::write(&filename, &program.data)?;
        println!(
            "wrote {} ({} records, {} bytes)",
            filename,
            program.record_count,
            program.data.len()
        );
    }

    let stats = decoder.stats();
    println!(
        "{} program(s) recovered, {} failed ({} record(s) from secondary copy, {} reconstructed)",
        stats.programs_emitted,
        stats.programs_failed,
        stats.records_from_secondary,
        stats.records_reconstructed
    );
    Ok(())
}

fn cmd_encode(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (positional, flags) = split_args(args);
    let input = positional.first().copied().unwrap_or_else(|| usage());
    let high_pass = flags.iter().any(|(n, _)| *n == "hpf");

    let data = fs::read(input)?;
    println!("Encoding {} bytes of data", data.len());

    let tape = TapeEncoder::with_high_pass(high_pass).encode(&data)?;
    println!(
        "Audio: {} samples, {:.2}s at {} Hz",
        tape.samples.len(),
        tape.duration,
        tape.sample_rate
    );

    match positional.get(1) {
        Some(output) => {
            wav::write_wav(output, &tape.samples)?;
            println!("wrote {}", output);
        }
        #[cfg(feature = "audio-live")]
        None => {
            println!("Playing...");
            ti99_tape::live::play_samples(&tape.samples, tape.sample_rate)?;
            println!("Done.");
        }
        #[cfg(not(feature = "audio-live"))]
        None => usage(),
    }
    Ok(())
}

fn cmd_list(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (positional, _) = split_args(args);
    let input = positional.first().copied().unwrap_or_else(|| usage());

    let image = fs::read(input)?;
    let header = basic::parse_header(&image)?;
    if header.protected() {
        println!("* program is protected");
    }
    for line in basic::list_program(&image)? {
        match line.text {
            Some(text) => println!("{:5} {}", line.number, text),
            None => println!("{:5} <line could not be decoded>", line.number),
        }
    }
    Ok(())
}

fn cmd_wrap(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let (positional, flags) = split_args(args);
    let input = positional.first().copied().unwrap_or_else(|| usage());
    let name = flag_value(&flags, "name").unwrap_or("TESTFILE");
    let default_output = format!("{}.tifile", name);
    let output = flag_value(&flags, "output").unwrap_or(&default_output);

    let data = fs::read(input)?;
    fs::write(output, tifiles::wrap_tifiles(name, &data))?;
    println!("wrote {}", output);
    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
    }

    let result = match args[1].as_str() {
        "decode" => cmd_decode(&args[2..]),
        "encode" => cmd_encode(&args[2..]),
        "list" => cmd_list(&args[2..]),
        "wrap" => cmd_wrap(&args[2..]),
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            usage();
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
