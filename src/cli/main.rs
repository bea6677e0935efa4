use ssign::config::{self, SignOptions};
use ssign::{HashAlgorithm, PrivateKey, PublicKey, SSError, SignatureEnvelope, secure_file};

use ssign::reexports::log;

use clap::{Arg, ArgAction, ArgMatches, Command, crate_description, crate_name, crate_version};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

fn read_file(path: &Path) -> Result<Vec<u8>, SSError> {
    std::fs::read(path).map_err(|e| SSError::file(path, e))
}

/// Path given on the command line (or through the environment), or the default.
fn path_arg(
    matches: &ArgMatches,
    id: &str,
    default: impl FnOnce() -> Option<PathBuf>,
    missing: &'static str,
) -> Result<PathBuf, SSError> {
    match matches.get_one::<String>(id) {
        Some(path) => Ok(PathBuf::from(path)),
        None => default().ok_or(SSError::UsageError(missing)),
    }
}

fn signature_path(matches: &ArgMatches, input_file: &Path) -> PathBuf {
    match matches.get_one::<String>("signature") {
        Some(path) => PathBuf::from(path),
        None => config::default_signature_path(input_file),
    }
}

fn ask_passphrase(key_file: &Path) -> Result<Zeroizing<String>, SSError> {
    let prompt = format!(
        "Enter the passphrase to unlock \"{}\": ",
        key_file.display()
    );
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .map_err(|e| SSError::KeyError(format!("could not read passphrase: {}", e)))
}

fn open_private_key(key_file: &Path) -> Result<PrivateKey, SSError> {
    let data = Zeroizing::new(secure_file::read_secure(key_file)?);
    let key = match PrivateKey::from_any(&data) {
        Err(SSError::PassphraseRequired) => {
            let passphrase = ask_passphrase(key_file).map_err(|e| e.in_file(key_file))?;
            PrivateKey::from_any_with_passphrase(&data, passphrase.as_bytes())
        }
        res => res,
    };
    key.map_err(|e| e.in_file(key_file))
}

fn start() -> Result<(), SSError> {
    let matches = Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Verbose output"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Prints debugging information"),
        )
        .subcommand(
            Command::new("sign")
                .about("Sign a file")
                .visible_alias("s")
                .arg(
                    Arg::new("key")
                        .value_name("private_key_file")
                        .long("key")
                        .short('k')
                        .env("SSIGN_KEY")
                        .help("SSH private key [default: $HOME/.ssh/id_ed25519]"),
                )
                .arg(
                    Arg::new("namespace")
                        .value_name("namespace")
                        .long("namespace")
                        .short('n')
                        .env("SSIGN_NAMESPACE")
                        .default_value(config::DEFAULT_NAMESPACE)
                        .help("Signature namespace"),
                )
                .arg(
                    Arg::new("hash")
                        .value_name("algorithm")
                        .long("hash")
                        .value_parser(HashAlgorithm::ALL.map(|h| h.name()))
                        .default_value(HashAlgorithm::default().name())
                        .help("Hash algorithm applied to the file"),
                )
                .arg(
                    Arg::new("in")
                        .value_name("file")
                        .required(true)
                        .help("File to sign"),
                )
                .arg(
                    Arg::new("signature")
                        .value_name("signature")
                        .help("Signature file [default: <file>.ssig]"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify a signature")
                .visible_alias("v")
                .arg(
                    Arg::new("public_key")
                        .value_name("public_key_file")
                        .long("public-key")
                        .short('K')
                        .env("SSIGN_PUBLIC_KEY")
                        .help("SSH public key [default: $HOME/.ssh/id_ed25519.pub]"),
                )
                .arg(
                    Arg::new("namespace")
                        .value_name("namespace")
                        .long("namespace")
                        .short('n')
                        .env("SSIGN_NAMESPACE")
                        .default_value(config::DEFAULT_NAMESPACE)
                        .help("Expected signature namespace"),
                )
                .arg(
                    Arg::new("in")
                        .value_name("file")
                        .required(true)
                        .help("Signed file"),
                )
                .arg(
                    Arg::new("signature")
                        .value_name("signature")
                        .help("Signature file [default: <file>.ssig]"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Print the content of a signature file without verifying it")
                .arg(
                    Arg::new("signature")
                        .value_name("signature")
                        .required(true)
                        .help("Signature file"),
                ),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let debug = matches.get_flag("debug");

    env_logger::builder()
        .format_timestamp(None)
        .format_level(false)
        .format_module_path(false)
        .format_target(false)
        .filter_level(if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Some(matches) = matches.subcommand_matches("sign") {
        let input_file = matches
            .get_one::<String>("in")
            .map(PathBuf::from)
            .ok_or(SSError::UsageError("Missing input file"))?;
        let key_file = path_arg(
            matches,
            "key",
            config::default_private_key_path,
            "Missing private key file",
        )?;
        let namespace = matches
            .get_one::<String>("namespace")
            .ok_or(SSError::UsageError("Missing namespace"))?;
        let hash_algorithm = match matches.get_one::<String>("hash") {
            Some(name) => HashAlgorithm::from_name(name)?,
            None => HashAlgorithm::default(),
        };
        let options = SignOptions::default()
            .with_namespace(namespace.as_str())
            .with_hash_algorithm(hash_algorithm);
        options.validate()?;
        let signature_file = signature_path(matches, &input_file);

        let key = open_private_key(&key_file)?;
        let message = read_file(&input_file)?;
        let envelope = key.sign_message(&message, &options.namespace, options.hash_algorithm)?;
        secure_file::write_atomic(&signature_file, envelope.to_pem().as_bytes())?;

        println!(
            "Signed {} with {}.",
            input_file.display(),
            key_file.display()
        );
        println!("Signature stored at {}.", signature_file.display());
        if verbose {
            println!(
                "Key: {} {}",
                key.algorithm(),
                key.public_key().fingerprint()
            );
            println!("Namespace: {}", options.namespace);
            println!("Hash: {}", options.hash_algorithm);
        }
    } else if let Some(matches) = matches.subcommand_matches("verify") {
        let input_file = matches
            .get_one::<String>("in")
            .map(PathBuf::from)
            .ok_or(SSError::UsageError("Missing input file"))?;
        let pk_file = path_arg(
            matches,
            "public_key",
            config::default_public_key_path,
            "Missing public key file",
        )?;
        let namespace = matches
            .get_one::<String>("namespace")
            .ok_or(SSError::UsageError("Missing namespace"))?;
        let signature_file = signature_path(matches, &input_file);

        let pk = PublicKey::from_file(&pk_file).map_err(|e| e.in_file(&pk_file))?;
        let message = read_file(&input_file)?;
        let armored = read_file(&signature_file)?;
        pk.verify_message(&message, &armored, namespace)
            .map_err(|e| e.in_file(&signature_file))?;

        println!(
            "Valid signature for {} at {}.",
            input_file.display(),
            signature_file.display()
        );
        println!("Signed by key {}.", pk_file.display());
        if verbose {
            println!("Key: {} {}", pk.algorithm(), pk.fingerprint());
        }
    } else if let Some(matches) = matches.subcommand_matches("show") {
        let signature_file = matches
            .get_one::<String>("signature")
            .map(PathBuf::from)
            .ok_or(SSError::UsageError("Missing signature file"))?;
        let envelope = SignatureEnvelope::from_pem(&read_file(&signature_file)?)
            .map_err(|e| e.in_file(&signature_file))?;
        println!("Namespace: {}", envelope.namespace);
        println!("Hash: {}", envelope.hash_algorithm);
        match envelope.public_key() {
            Ok(pk) => {
                println!("Key: {} {}", pk.algorithm(), pk.fingerprint());
                if verbose {
                    println!("{}", pk.to_openssh());
                }
            }
            Err(e) => println!("Key: unreadable ({})", e),
        }
        if !envelope.reserved.is_empty() {
            println!("Reserved: {} bytes", envelope.reserved.len());
        }
    } else {
        return Err(SSError::UsageError("No subcommand specified"));
    }
    Ok(())
}

fn main() -> Result<(), SSError> {
    let res = start();
    match res {
        Ok(_) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
    Ok(())
}
