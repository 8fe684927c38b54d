#[cfg(test)]
mod tests {
    use crate::cli::{resolve_kinds, App, Cli, Commands, KindSelection};
    use crate::config::{AppConfig, BackendKind, BatchSettings, StoreConfig};
    use crate::error::AppError;
    use crate::models::{Entity, EntityId, Key};
    use crate::store::{MemoryStore, SharedStore, Store};
    use clap::Parser;
    use rstest::rstest;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn kinds(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                backend: BackendKind::Memory,
                database_url: None,
                max_connections: 1,
            },
            batch: BatchSettings {
                workers: 3,
                export_chunk: 4,
                import_chunk: 3,
                delete_page: 5,
            },
            profile_dir: dir.to_path_buf(),
            export_dir: dir.join("export"),
            import_dir: dir.join("import"),
            connect_attempts: 1,
            log_dir: None,
        }
    }

    // acme: Invoice (12), Customer (3); default namespace: Log (7)
    fn app(dir: &Path) -> (Arc<MemoryStore>, App) {
        let memory = MemoryStore::new();
        memory.insert((1..=12).map(|i| {
            Entity::new(Key::new("acme", "Invoice", EntityId::Id(i))).with_property("amount", i * 10)
        }));
        memory.insert(["ann", "bo", "cy"].iter().map(|name| {
            Entity::new(Key::new("acme", "Customer", EntityId::Name(name.to_string())))
                .with_property("vip", *name == "bo")
        }));
        memory.insert(
            (1..=7).map(|i| Entity::new(Key::new("", "Log", EntityId::Id(i))).with_property("line", "x")),
        );
        let memory = Arc::new(memory);
        let store: SharedStore = memory.clone();
        (memory, App::new(store, config(dir)))
    }

    fn parse(args: &[&str]) -> Commands {
        let cli = Cli::try_parse_from(args).unwrap();
        cli.command.unwrap()
    }

    #[test]
    fn test_no_subcommand_means_interactive() {
        let cli = Cli::try_parse_from(["dsm"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.has_connection_override());
    }

    #[test]
    fn test_global_connection_flags_override_config() {
        let cli = Cli::try_parse_from([
            "dsm",
            "namespaces",
            "--backend",
            "memory",
            "--database-url",
            "postgres://cli/db",
        ])
        .unwrap();
        assert!(cli.has_connection_override());

        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.store.backend = BackendKind::Postgres;
        cli.apply_overrides(&mut config);
        assert_eq!(config.store.backend, BackendKind::Memory);
        assert_eq!(config.store.database_url.as_deref(), Some("postgres://cli/db"));
    }

    #[test]
    fn test_export_arguments() {
        match parse(&["dsm", "export", "-n", "acme", "--select", "1,2", "-o", "/tmp/x"]) {
            Commands::Export(args) => {
                assert_eq!(args.namespace, "acme");
                assert_eq!(args.kinds.select.as_deref(), Some("1,2"));
                assert_eq!(args.out, Some(PathBuf::from("/tmp/x")));
            },
            other => panic!("unexpected command {:?}", other),
        }

        assert!(Cli::try_parse_from(["dsm", "export", "--all", "--select", "1"]).is_err());
    }

    #[test]
    fn test_namespace_defaults_to_default_namespace() {
        match parse(&["dsm", "delete-namespace", "-y"]) {
            Commands::DeleteNamespace(args) => {
                assert_eq!(args.namespace, "");
                assert!(args.yes);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[rstest]
    #[case(KindSelection { all: true, ..Default::default() }, &["A", "B", "C"])]
    #[case(KindSelection { select: Some("3-2".into()), ..Default::default() }, &["B", "C"])]
    #[case(KindSelection { select: Some("all".into()), ..Default::default() }, &["A", "B", "C"])]
    #[case(KindSelection { kinds: kinds(&["C", "A"]), ..Default::default() }, &["C", "A"])]
    fn test_resolve_kinds(#[case] choice: KindSelection, #[case] expected: &[&str]) {
        let available = kinds(&["A", "B", "C"]);
        assert_eq!(resolve_kinds(&available, &choice).unwrap(), kinds(expected));
    }

    #[rstest]
    #[case(KindSelection::default())]
    #[case(KindSelection { select: Some("9,x".into()), ..Default::default() })]
    #[case(KindSelection { select: Some("CAB".into()), ..Default::default() })]
    #[case(KindSelection { select: Some("NEW Z".into()), ..Default::default() })]
    #[case(KindSelection { kinds: kinds(&["A", "Nope"]), ..Default::default() })]
    fn test_resolve_kinds_rejects(#[case] choice: KindSelection) {
        let available = kinds(&["A", "B", "C"]);
        assert!(matches!(
            resolve_kinds(&available, &choice),
            Err(AppError::Cli(_))
        ));
    }

    #[tokio::test]
    async fn test_export_all_kinds_writes_one_file_each() {
        let dir = tempfile::tempdir().unwrap();
        let (_memory, app) = app(dir.path());

        app.run_command(parse(&["dsm", "export", "-n", "acme", "--all"]))
            .await
            .unwrap();

        let export_dir = dir.path().join("export");
        assert!(export_dir.join("acme_Customer.csv").is_file());
        let invoices = std::fs::read_to_string(export_dir.join("acme_Invoice.csv")).unwrap();
        assert_eq!(invoices.lines().count(), 13);
        assert_eq!(invoices.lines().next(), Some("EntityKey,amount"));
    }

    #[tokio::test]
    async fn test_import_derives_kind_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let (memory, app) = app(dir.path());
        let file = dir.path().join("Product.csv");
        std::fs::write(&file, "EntityKey,title\n1,Lamp\nsku-9,Desk\n").unwrap();

        app.run_command(Commands::Import(crate::cli::ImportArgs {
            namespace: "acme".into(),
            kind: None,
            file,
        }))
        .await
        .unwrap();

        assert_eq!(memory.count("acme", "Product"), 2);
        assert_eq!(
            app.store().list_kinds("acme").await.unwrap(),
            kinds(&["Customer", "Invoice", "Product"])
        );
    }

    #[tokio::test]
    async fn test_delete_kind_uses_configured_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let (memory, app) = app(dir.path());

        app.run_command(parse(&["dsm", "delete-kind", "-n", "acme", "Invoice", "--yes"]))
            .await
            .unwrap();

        assert_eq!(memory.count("acme", "Invoice"), 0);
        assert_eq!(memory.count("acme", "Customer"), 3);
        // 12 keys with pages of 5
        assert_eq!(memory.call_counts().delete_multi, 3);
    }

    #[tokio::test]
    async fn test_delete_namespace_leaves_others() {
        let dir = tempfile::tempdir().unwrap();
        let (memory, app) = app(dir.path());

        assert_eq!(app.delete_namespace("acme").await.unwrap(), 15);
        assert_eq!(app.store().list_namespaces().await.unwrap(), kinds(&[""]));
        assert_eq!(memory.count("", "Log"), 7);
    }

    #[tokio::test]
    async fn test_shell_commands_are_not_batch_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (_memory, app) = app(dir.path());
        assert!(matches!(
            app.run_command(Commands::Interactive).await,
            Err(AppError::Cli(_))
        ));
    }
}
