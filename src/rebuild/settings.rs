use crate::jvm::class_graph::find_java_home;
use std::path::PathBuf;

pub struct Settings {
    /// Class file to rewrite
    pub input: PathBuf,

    /// Simple name of the method whose stack map is rebuilt (eg. `main` or `<init>`)
    pub method_name: String,

    /// Descriptor picking one method among overloads (eg. `([Ljava/lang/String;)V`)
    ///
    /// Without one, the first method with a matching name is used.
    pub method_descriptor: Option<String>,

    /// Root under which the rewritten class is saved (as `<root>/<internal name>.class`)
    pub output_directory: PathBuf,

    /// Directories, jars, and jmods searched for classes the method refers to
    pub class_path: Vec<PathBuf>,

    /// JDK whose standard library is searched before `class_path`
    pub java_home: Option<PathBuf>,
}

impl Settings {
    pub const DEFAULT_OUTPUT_DIRECTORY: &'static str = "/tmp";

    /// Settings for rewriting a method, with the default output directory, no class path, and the
    /// JDK found through `JAVA_HOME` or `PATH`
    pub fn new(input: impl Into<PathBuf>, method_name: impl Into<String>) -> Settings {
        Settings {
            input: input.into(),
            method_name: method_name.into(),
            method_descriptor: None,
            output_directory: PathBuf::from(Settings::DEFAULT_OUTPUT_DIRECTORY),
            class_path: vec![],
            java_home: find_java_home(),
        }
    }
}
