//! File operations inside a running workload, built entirely out of shell
//! commands over the exec seam: `ls -al` for listing and existence checks,
//! `mkdir`/`touch`/`rm`/`mv`/`cat` and an `echo` redirect for mutations.
//!
//! Every request declares its action and the handler rejects mismatches
//! before issuing any remote command. All paths are relative to the
//! workspace root.

use std::sync::Arc;

use crate::cluster::CommandRunner;
use crate::error::{Error, Result};
use crate::models::{
    ContentRequest, CreateRequest, DeleteRequest, DirectoryAction, DirectoryEntry, EntryKind,
    ListRequest, RenameRequest, SaveRequest,
};

pub struct FileService {
    runner: Arc<dyn CommandRunner>,
    root: String,
}

impl FileService {
    pub fn new(runner: Arc<dyn CommandRunner>, workspace_root: impl Into<String>) -> Self {
        Self {
            runner,
            root: workspace_root.into(),
        }
    }

    pub async fn list(&self, workload: &str, mut req: ListRequest) -> Result<ListRequest> {
        if req.action != DirectoryAction::List {
            return Err(Error::InvalidAction);
        }

        let command = format!("ls -al {}", shell_words::quote(&self.dir_path(&req.path)));
        let output = self.runner.run(workload, &command).await?;

        req.children = parse_listing(&output);
        Ok(req)
    }

    pub async fn create(&self, workload: &str, req: CreateRequest) -> Result<CreateRequest> {
        if req.action != DirectoryAction::Create {
            return Err(Error::InvalidAction);
        }

        if self.lookup(workload, &req.path, &req.name).await?.is_some() {
            return Err(Error::DuplicateName);
        }

        let target = shell_words::quote(&self.child_path(&req.path, &req.name)).into_owned();
        let command = match req.kind {
            EntryKind::Directory => format!("mkdir {target}"),
            EntryKind::File => format!("touch {target}"),
        };
        self.runner.run(workload, &command).await?;

        Ok(req)
    }

    pub async fn delete(&self, workload: &str, req: DeleteRequest) -> Result<DeleteRequest> {
        if req.action != DirectoryAction::Delete {
            return Err(Error::InvalidAction);
        }

        match self.lookup(workload, &req.path, &req.name).await? {
            None => Err(Error::PathNotFound),
            Some(kind) if kind != req.kind => Err(Error::InvalidType),
            Some(_) => {
                let target = shell_words::quote(&self.child_path(&req.path, &req.name)).into_owned();
                self.runner.run(workload, &format!("rm -rf {target}")).await?;
                Ok(req)
            }
        }
    }

    pub async fn rename(&self, workload: &str, req: RenameRequest) -> Result<RenameRequest> {
        if req.action != DirectoryAction::Rename {
            return Err(Error::InvalidAction);
        }

        if self
            .lookup(workload, &req.path, &req.new_name)
            .await?
            .is_some()
        {
            return Err(Error::DuplicateName);
        }

        match self.lookup(workload, &req.path, &req.old_name).await? {
            None => Err(Error::PathNotFound),
            Some(kind) if kind != req.kind => Err(Error::InvalidType),
            Some(_) => {
                let old = shell_words::quote(&self.child_path(&req.path, &req.old_name)).into_owned();
                let new = shell_words::quote(&self.child_path(&req.path, &req.new_name)).into_owned();
                self.runner.run(workload, &format!("mv {old} {new}")).await?;
                Ok(req)
            }
        }
    }

    pub async fn content(&self, workload: &str, mut req: ContentRequest) -> Result<ContentRequest> {
        if req.action != DirectoryAction::Content {
            return Err(Error::InvalidAction);
        }
        if req.kind != EntryKind::File {
            return Err(Error::InvalidType);
        }

        let target = shell_words::quote(&self.child_path(&req.path, &req.name)).into_owned();
        req.content = self.runner.run(workload, &format!("cat {target}")).await?;
        Ok(req)
    }

    pub async fn save(&self, workload: &str, req: SaveRequest) -> Result<SaveRequest> {
        if req.action != DirectoryAction::Save {
            return Err(Error::InvalidAction);
        }
        if req.kind != EntryKind::File {
            return Err(Error::InvalidType);
        }

        let target = shell_words::quote(&self.child_path(&req.path, &req.name)).into_owned();
        let command = format!("echo {} > {target}", shell_words::quote(&req.content));
        self.runner.run(workload, &command).await?;

        Ok(req)
    }

    /// Filtered listing for one name; `Some(kind)` when an entry matches it
    /// exactly. A `grep` without matches exits non-zero with empty output,
    /// which the executor reports as empty success.
    async fn lookup(&self, workload: &str, path: &str, name: &str) -> Result<Option<EntryKind>> {
        let command = format!(
            "ls -al {} | grep {}",
            shell_words::quote(&self.dir_path(path)),
            shell_words::quote(name)
        );
        let output = self.runner.run(workload, &command).await?;

        Ok(parse_listing(&output)
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.kind))
    }

    fn dir_path(&self, path: &str) -> String {
        format!("{}{path}", self.root)
    }

    fn child_path(&self, path: &str, name: &str) -> String {
        format!("{}{path}/{name}", self.root)
    }
}

/// Parses `ls -al` output into numbered entries.
///
/// Contract: whitespace-split each line; skip empty lines, the `total`
/// summary, lines with fewer than nine fields, and the `.`/`..` entries.
/// Field 0's first character distinguishes directories; field 8 is the name
/// (names containing whitespace are truncated at the first space — a known
/// limit of listing-output parsing). Surviving entries are numbered from 1
/// in input order.
pub fn parse_listing(output: &str) -> Vec<DirectoryEntry> {
    let mut entries = Vec::new();

    for line in output.lines() {
        if line.is_empty() || line.starts_with("total") {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }

        let name = parts[8];
        if name == "." || name == ".." {
            continue;
        }

        let kind = if parts[0].starts_with('d') {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        entries.push(DirectoryEntry {
            id: entries.len() as u32 + 1,
            kind,
            name: name.to_string(),
        });
    }

    entries
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    const LISTING: &str = "\
total 16
drwxr-xr-x 4 root root 4096 Mar  3 10:00 .
drwxr-xr-x 3 root root 4096 Mar  3 09:00 ..
-rw-r--r-- 1 root root  120 Mar  3 10:00 main.py
drwxr-xr-x 2 root root 4096 Mar  3 10:00 src";

    /// Replays scripted responses in order and records every command.
    struct StubRunner {
        responses: Mutex<VecDeque<Result<String>>>,
        commands: Mutex<Vec<String>>,
    }

    impl StubRunner {
        fn script(responses: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                commands: Mutex::new(Vec::new()),
            })
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, _workload: &str, command: &str) -> Result<String> {
            self.commands.lock().unwrap().push(command.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(String::new()))
        }
    }

    fn service(runner: Arc<StubRunner>) -> FileService {
        FileService::new(runner, "/app")
    }

    #[test]
    fn parses_listing_skipping_dots_and_summary() {
        let entries = parse_listing(LISTING);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].name, "main.py");
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].kind, EntryKind::Directory);
        assert_eq!(entries[1].name, "src");
    }

    #[test]
    fn parser_skips_unparseable_lines() {
        let entries = parse_listing("garbage line\n-rw-r--r-- 1 u g 1 Jan 1 00:00 ok");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "ok");
    }

    #[tokio::test]
    async fn list_fills_children_from_ls_output() {
        let runner = StubRunner::script(vec![Ok(LISTING.to_string())]);
        let svc = service(runner.clone());

        let req = ListRequest {
            action: DirectoryAction::List,
            path: "/src".to_string(),
            children: vec![],
        };
        let result = svc.list("demo-abcd", req).await.unwrap();

        assert_eq!(result.children.len(), 2);
        assert_eq!(runner.commands(), vec!["ls -al /app/src".to_string()]);
    }

    #[tokio::test]
    async fn mismatched_action_is_rejected_before_any_command() {
        let runner = StubRunner::script(vec![]);
        let svc = service(runner.clone());

        let req = ListRequest {
            action: DirectoryAction::Delete,
            path: "/".to_string(),
            children: vec![],
        };
        assert!(matches!(
            svc.list("demo-abcd", req).await,
            Err(Error::InvalidAction)
        ));
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn create_succeeds_then_rejects_duplicate() {
        let existing = "-rw-r--r-- 1 root root 0 Mar  3 10:00 notes.txt";

        // First create: lookup finds nothing, touch runs.
        let runner = StubRunner::script(vec![Ok(String::new()), Ok(String::new())]);
        let svc = service(runner.clone());
        let req = CreateRequest {
            action: DirectoryAction::Create,
            kind: EntryKind::File,
            path: "".to_string(),
            name: "notes.txt".to_string(),
        };
        svc.create("demo-abcd", req.clone()).await.unwrap();
        assert_eq!(runner.commands()[1], "touch /app/notes.txt");

        // Second create against the now-populated listing: duplicate.
        let runner = StubRunner::script(vec![Ok(existing.to_string())]);
        let svc = service(runner.clone());
        assert!(matches!(
            svc.create("demo-abcd", req).await,
            Err(Error::DuplicateName)
        ));
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn create_directory_uses_mkdir() {
        let runner = StubRunner::script(vec![Ok(String::new()), Ok(String::new())]);
        let svc = service(runner.clone());

        let req = CreateRequest {
            action: DirectoryAction::Create,
            kind: EntryKind::Directory,
            path: "/src".to_string(),
            name: "lib".to_string(),
        };
        svc.create("demo-abcd", req).await.unwrap();
        assert_eq!(runner.commands()[1], "mkdir /app/src/lib");
    }

    #[tokio::test]
    async fn delete_missing_path_fails_without_mutation() {
        let runner = StubRunner::script(vec![Ok(String::new())]);
        let svc = service(runner.clone());

        let req = DeleteRequest {
            action: DirectoryAction::Delete,
            kind: EntryKind::File,
            path: "".to_string(),
            name: "ghost".to_string(),
        };
        assert!(matches!(
            svc.delete("demo-abcd", req).await,
            Err(Error::PathNotFound)
        ));
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn delete_type_mismatch_fails_without_mutation() {
        let listing = "drwxr-xr-x 2 root root 4096 Mar  3 10:00 src";
        let runner = StubRunner::script(vec![Ok(listing.to_string())]);
        let svc = service(runner.clone());

        let req = DeleteRequest {
            action: DirectoryAction::Delete,
            kind: EntryKind::File,
            path: "".to_string(),
            name: "src".to_string(),
        };
        assert!(matches!(
            svc.delete("demo-abcd", req).await,
            Err(Error::InvalidType)
        ));
        assert!(!runner.commands().iter().any(|c| c.starts_with("rm")));
    }

    #[tokio::test]
    async fn rename_rejects_existing_new_name() {
        let listing = "-rw-r--r-- 1 root root 0 Mar  3 10:00 taken.txt";
        let runner = StubRunner::script(vec![Ok(listing.to_string())]);
        let svc = service(runner.clone());

        let req = RenameRequest {
            action: DirectoryAction::Rename,
            kind: EntryKind::File,
            path: "".to_string(),
            old_name: "a.txt".to_string(),
            new_name: "taken.txt".to_string(),
        };
        assert!(matches!(
            svc.rename("demo-abcd", req).await,
            Err(Error::DuplicateName)
        ));
    }

    #[tokio::test]
    async fn rename_type_mismatch_issues_no_mv() {
        let old_listing = "drwxr-xr-x 2 root root 4096 Mar  3 10:00 src";
        let runner = StubRunner::script(vec![
            Ok(String::new()),          // new name free
            Ok(old_listing.to_string()), // old name is a directory
        ]);
        let svc = service(runner.clone());

        let req = RenameRequest {
            action: DirectoryAction::Rename,
            kind: EntryKind::File,
            path: "".to_string(),
            old_name: "src".to_string(),
            new_name: "srcv2".to_string(),
        };
        assert!(matches!(
            svc.rename("demo-abcd", req).await,
            Err(Error::InvalidType)
        ));
        assert!(!runner.commands().iter().any(|c| c.starts_with("mv")));
    }

    #[tokio::test]
    async fn rename_moves_matching_entry() {
        let old_listing = "-rw-r--r-- 1 root root 10 Mar  3 10:00 a.txt";
        let runner = StubRunner::script(vec![Ok(String::new()), Ok(old_listing.to_string())]);
        let svc = service(runner.clone());

        let req = RenameRequest {
            action: DirectoryAction::Rename,
            kind: EntryKind::File,
            path: "/docs".to_string(),
            old_name: "a.txt".to_string(),
            new_name: "b.txt".to_string(),
        };
        svc.rename("demo-abcd", req).await.unwrap();
        assert_eq!(runner.commands()[2], "mv /app/docs/a.txt /app/docs/b.txt");
    }

    #[tokio::test]
    async fn content_requires_file_kind() {
        let runner = StubRunner::script(vec![]);
        let svc = service(runner.clone());

        let req = ContentRequest {
            action: DirectoryAction::Content,
            kind: EntryKind::Directory,
            path: "".to_string(),
            name: "src".to_string(),
            content: String::new(),
        };
        assert!(matches!(
            svc.content("demo-abcd", req).await,
            Err(Error::InvalidType)
        ));
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn content_returns_cat_output() {
        let runner = StubRunner::script(vec![Ok("print('hi')".to_string())]);
        let svc = service(runner.clone());

        let req = ContentRequest {
            action: DirectoryAction::Content,
            kind: EntryKind::File,
            path: "".to_string(),
            name: "main.py".to_string(),
            content: String::new(),
        };
        let result = svc.content("demo-abcd", req).await.unwrap();
        assert_eq!(result.content, "print('hi')");
        assert_eq!(runner.commands(), vec!["cat /app/main.py".to_string()]);
    }

    #[tokio::test]
    async fn save_escapes_single_quotes_in_content() {
        let runner = StubRunner::script(vec![Ok(String::new())]);
        let svc = service(runner.clone());

        let req = SaveRequest {
            action: DirectoryAction::Save,
            kind: EntryKind::File,
            path: "".to_string(),
            name: "notes.txt".to_string(),
            content: "it's done".to_string(),
        };
        svc.save("demo-abcd", req).await.unwrap();

        let command = &runner.commands()[0];
        assert!(command.starts_with("echo "));
        assert!(command.contains(r#"'it'\''s done'"#));
        assert!(command.ends_with("> /app/notes.txt"));
    }
}
