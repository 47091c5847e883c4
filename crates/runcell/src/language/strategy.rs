//! Execution strategies
//!
//! - [`Interpreted`]: write the source and hand it to the interpreter
//! - [`Compiled`]: derive the entry class, compile, then run the class
//! - [`SourceRun`]: write a project file next to the source, then run it

use std::path::Path;

use crate::config::{CompileConfig, Language, Placeholders};
use crate::language::class_name::entry_class;
use crate::language::{
    LanguageExecutor, PrepareError, RunPlan, SourceFile, Stage, StageKind,
};
use crate::workspace::is_plain_file_name;

fn stage(
    language: &Language,
    kind: StageKind,
    command: &[String],
    placeholders: &Placeholders<'_>,
    workspace: &Path,
) -> Stage {
    Stage {
        kind,
        command: Language::expand_command(command, placeholders),
        working_dir: workspace.to_path_buf(),
        env: language.env.clone(),
        extra_path: language.extra_path.clone(),
        pipes_input: kind == StageKind::Run,
    }
}

/// Source handed straight to an interpreter
#[derive(Debug)]
pub struct Interpreted {
    language: Language,
}

impl Interpreted {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl LanguageExecutor for Interpreted {
    fn language(&self) -> &Language {
        &self.language
    }

    fn prepare(&self, code: &str, workspace: &Path) -> Result<RunPlan, PrepareError> {
        let workspace_str = workspace.to_string_lossy();
        let source = self.language.source_name.clone();
        let placeholders = Placeholders {
            source: &source,
            class: "",
            workspace: &workspace_str,
        };

        Ok(RunPlan {
            stages: vec![stage(
                &self.language,
                StageKind::Run,
                &self.language.run.command,
                &placeholders,
                workspace,
            )],
            files: vec![SourceFile {
                name: source,
                contents: code.to_owned(),
            }],
        })
    }
}

/// Compile to artifacts in the workspace, then run the entry class
#[derive(Debug)]
pub struct Compiled {
    language: Language,
    compile: CompileConfig,
}

impl Compiled {
    /// Returns `None` if the language has no compile section
    pub fn new(language: Language) -> Option<Self> {
        let compile = language.compile.clone()?;
        Some(Self { language, compile })
    }
}

impl LanguageExecutor for Compiled {
    fn language(&self) -> &Language {
        &self.language
    }

    fn prepare(&self, code: &str, workspace: &Path) -> Result<RunPlan, PrepareError> {
        let class = entry_class(code, &self.compile.default_class)?;
        let source = self.language.source_name_for(&class);
        if !is_plain_file_name(&source) {
            return Err(PrepareError::InvalidClassName(class));
        }

        let workspace_str = workspace.to_string_lossy();
        let placeholders = Placeholders {
            source: &source,
            class: &class,
            workspace: &workspace_str,
        };

        let compile = stage(
            &self.language,
            StageKind::Compile,
            &self.compile.command,
            &placeholders,
            workspace,
        );
        let run = stage(
            &self.language,
            StageKind::Run,
            &self.language.run.command,
            &placeholders,
            workspace,
        );

        Ok(RunPlan {
            files: vec![SourceFile {
                name: source,
                contents: code.to_owned(),
            }],
            stages: vec![compile, run],
        })
    }
}

/// Runner that executes source directly but wants a project file beside it
#[derive(Debug)]
pub struct SourceRun {
    language: Language,
}

impl SourceRun {
    pub fn new(language: Language) -> Self {
        Self { language }
    }
}

impl LanguageExecutor for SourceRun {
    fn language(&self) -> &Language {
        &self.language
    }

    fn prepare(&self, code: &str, workspace: &Path) -> Result<RunPlan, PrepareError> {
        let workspace_str = workspace.to_string_lossy();
        let source = self.language.source_name.clone();
        let placeholders = Placeholders {
            source: &source,
            class: "",
            workspace: &workspace_str,
        };

        let mut files = Vec::with_capacity(2);
        if let Some(project) = &self.language.project_file {
            files.push(SourceFile {
                name: project.name.clone(),
                contents: project.contents.clone(),
            });
        }
        files.push(SourceFile {
            name: source.clone(),
            contents: code.to_owned(),
        });

        Ok(RunPlan {
            files,
            stages: vec![stage(
                &self.language,
                StageKind::Run,
                &self.language.run.command,
                &placeholders,
                workspace,
            )],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn language(id: &str) -> Language {
        Config::default().get_language(id).unwrap().clone()
    }

    #[test]
    fn interpreted_python_plan() {
        let executor = Interpreted::new(language("python"));
        let plan = executor
            .prepare("print('hi')", Path::new("/tmp/ws"))
            .unwrap();

        assert_eq!(plan.files.len(), 1);
        assert_eq!(plan.files[0].name, "script.py");
        assert_eq!(plan.files[0].contents, "print('hi')");
        assert_eq!(plan.stages.len(), 1);
        assert_eq!(plan.stages[0].command, vec!["python3", "script.py"]);
        assert_eq!(plan.stages[0].working_dir, Path::new("/tmp/ws"));
        assert!(plan.stages[0].pipes_input);
        assert!(!plan.has_compile_stage());
    }

    #[test]
    fn compiled_java_uses_public_class() {
        let executor = Compiled::new(language("java")).unwrap();
        let code = "public class Greeter { public static void main(String[] a) {} }";
        let plan = executor.prepare(code, Path::new("/tmp/ws")).unwrap();

        assert_eq!(plan.source_name(), Some("Greeter.java"));
        assert_eq!(plan.stages.len(), 2);

        let compile = &plan.stages[0];
        assert_eq!(compile.kind, StageKind::Compile);
        assert_eq!(compile.command, vec!["javac", "Greeter.java"]);
        assert!(!compile.pipes_input);

        let run = &plan.stages[1];
        assert_eq!(run.kind, StageKind::Run);
        assert_eq!(run.command, vec!["java", "-cp", "/tmp/ws", "Greeter"]);
        assert!(run.pipes_input);
        assert!(run.env.iter().any(|e| e.name == "JAVA_HOME"));
        assert!(!run.extra_path.is_empty());
    }

    #[test]
    fn compiled_java_defaults_to_main() {
        let executor = Compiled::new(language("java")).unwrap();
        let plan = executor
            .prepare("class Foo { }", Path::new("/tmp/ws"))
            .unwrap();
        assert_eq!(plan.source_name(), Some("Main.java"));
        assert_eq!(plan.stages[1].command.last().unwrap(), "Main");
    }

    #[test]
    fn compiled_java_ambiguous_class() {
        let executor = Compiled::new(language("java")).unwrap();
        let code = "public class A {}\npublic class B {}";
        let err = executor.prepare(code, Path::new("/tmp/ws")).unwrap_err();
        assert!(matches!(err, PrepareError::AmbiguousClass(ref c) if c == &["A", "B"]));
    }

    #[test]
    fn compiled_requires_compile_section() {
        assert!(Compiled::new(language("python")).is_none());
    }

    #[test]
    fn source_run_writes_project_file_first() {
        let executor = SourceRun::new(language("typescript"));
        let plan = executor
            .prepare("console.log(1)", Path::new("/tmp/ws"))
            .unwrap();

        let names: Vec<_> = plan.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["tsconfig.json", "script.ts"]);
        assert!(plan.files[0].contents.contains("compilerOptions"));
        assert_eq!(plan.source_name(), Some("script.ts"));
        assert_eq!(plan.stages[0].command, vec!["npx", "tsx", "script.ts"]);
    }

    #[test]
    fn source_run_without_project_file() {
        let mut lang = language("typescript");
        lang.project_file = None;
        let plan = SourceRun::new(lang)
            .prepare("let x = 1", Path::new("/tmp/ws"))
            .unwrap();
        assert_eq!(plan.files.len(), 1);
    }
}
