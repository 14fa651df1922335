use stackmap_rebuild::rebuild;

use clap::{crate_version, Arg, ArgAction, Command};
use std::path::PathBuf;

fn main() -> Result<(), rebuild::Error> {
    env_logger::init();

    let matches = Command::new("Stack map rebuilder")
        .version(crate_version!())
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Recompute the StackMapTable of one method in a JVM class file")
        .arg(
            Arg::new("CLASSFILE")
                .help("Class file containing the method")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("METHOD")
                .help("Name of the method whose stack map should be rebuilt")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("descriptor")
                .long("descriptor")
                .value_name("DESC")
                .help("Method descriptor to pick one overload (eg. `(I)V`)"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("DIR")
                .default_value(rebuild::Settings::DEFAULT_OUTPUT_DIRECTORY)
                .help("Directory under which the rewritten class is saved"),
        )
        .arg(
            Arg::new("classpath")
                .long("classpath")
                .value_name("PATH")
                .action(ArgAction::Append)
                .help("Directories, jars, and jmods holding referenced classes (`:` separated)"),
        )
        .arg(
            Arg::new("java-home")
                .long("java-home")
                .value_name("DIR")
                .help("JDK whose classes are searched first (defaults to JAVA_HOME, then PATH)"),
        )
        .arg(
            Arg::new("no-jdk")
                .long("no-jdk")
                .action(ArgAction::SetTrue)
                .conflicts_with("java-home")
                .help("Do not search a JDK for referenced classes"),
        )
        .get_matches();

    let input = matches
        .get_one::<String>("CLASSFILE")
        .map(PathBuf::from)
        .unwrap_or_default();
    let method_name = matches
        .get_one::<String>("METHOD")
        .cloned()
        .unwrap_or_default();

    let mut settings = rebuild::Settings::new(input, method_name);
    settings.method_descriptor = matches.get_one::<String>("descriptor").cloned();
    if let Some(output_directory) = matches.get_one::<String>("output-dir") {
        settings.output_directory = PathBuf::from(output_directory);
    }
    if let Some(class_paths) = matches.get_many::<String>("classpath") {
        settings.class_path = class_paths
            .flat_map(|class_path| class_path.split(':'))
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect();
    }

    if let Some(java_home) = matches.get_one::<String>("java-home") {
        settings.java_home = Some(PathBuf::from(java_home));
    }
    if matches.get_flag("no-jdk") {
        settings.java_home = None;
    }

    rebuild::run(&settings)?;
    Ok(())
}
