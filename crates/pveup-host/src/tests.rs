use super::*;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use pveup_security::sha256_hex;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "pveup-host-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    fs::create_dir_all(&path).expect("must create test root");
    path
}

#[test]
fn parse_df_available_gb_reads_available_column() {
    let output = "Filesystem     1024-blocks    Used Available Capacity Mounted on\n\
                  /dev/mapper/pve-root 98497780 9123456 84318772      10% /\n";
    assert_eq!(parse_df_available_gb(output).expect("must parse"), 80);
}

#[test]
fn parse_df_available_gb_rejects_header_only_output() {
    let err = parse_df_available_gb("Filesystem 1024-blocks Used Available Capacity Mounted on\n")
        .expect_err("missing data line must error");
    assert!(err.to_string().contains("no data line"));
}

#[test]
fn parse_loadavg_and_entropy_read_proc_formats() {
    assert_eq!(
        parse_loadavg("0.52 0.58 0.59 1/1021 123456\n").expect("must parse"),
        0.52
    );
    assert_eq!(parse_entropy("256\n").expect("must parse"), 256);
    assert!(parse_entropy("lots").is_err());
}

#[test]
fn count_running_guests_skips_header_and_stopped_rows() {
    let qm = "      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID\n\
              100 web                  running    4096              32.00 1234\n\
              101 db                   stopped    8192              64.00 0\n\
              102 cache                running    1024               8.00 5678\n";
    assert_eq!(count_running_guests(qm), 2);
    assert_eq!(count_running_guests(""), 0);
}

#[test]
fn count_running_guests_reads_only_the_status_column() {
    let qm = "      VMID NAME                 STATUS     MEM(MB)    BOOTDISK(GB) PID\n\
              100 running              stopped    4096              32.00 0\n\
              101 db                   running    8192              64.00 4321\n";
    assert_eq!(count_running_guests(qm), 1);

    let pct = "VMID       Status     Lock         Name\n\
               200        running                 proxy\n\
               201        stopped                 running\n\
               202        running    backup       mail\n";
    assert_eq!(count_running_guests(pct), 2);

    assert_eq!(count_running_guests("100 web running 4096 32.00 1234\n"), 0);
}

#[test]
fn parse_checklist_summary_reads_colored_counters() {
    let output = "= SUMMARY =\n\nTOTAL:    42\n\u{1b}[32mPASSED:   38\u{1b}[0m\nSKIPPED:   2\n\u{1b}[33mWARNINGS:  2\u{1b}[0m\n";
    let summary = parse_checklist_summary(output).expect("must parse");
    assert_eq!(
        summary,
        ChecklistSummary {
            passed: 38,
            warnings: 2,
            failures: 0
        }
    );
}

#[test]
fn parse_checklist_summary_requires_summary_block() {
    assert!(parse_checklist_summary("INFO: Checking for package updates..\n").is_none());
    let failing = parse_checklist_summary("TOTAL: 3\nPASSED: 1\nFAILURES: 2\n").expect("must parse");
    assert_eq!(failing.failures, 2);
}

#[test]
fn retire_suite_lines_comments_active_source_suite_entries_only() {
    let content = "deb http://ftp.debian.org/debian bookworm main contrib\n\
                   deb http://ftp.debian.org/debian bookworm-updates main contrib\n\
                   # deb http://download.proxmox.com/debian/pve bookworm pve-no-subscription\n\
                   deb http://security.debian.org/debian-security bookworm-security main\n\
                   deb http://example.test/debian trixie main\n";
    let rewritten = retire_suite_lines(content, "bookworm").expect("must change");

    let lines = rewritten.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "# disabled by pveup: deb http://ftp.debian.org/debian bookworm main contrib"
    );
    assert!(lines[1].starts_with("# disabled by pveup: "));
    assert_eq!(
        lines[2],
        "# deb http://download.proxmox.com/debian/pve bookworm pve-no-subscription"
    );
    assert!(lines[3].starts_with("# disabled by pveup: "));
    assert_eq!(lines[4], "deb http://example.test/debian trixie main");
    assert!(rewritten.ends_with('\n'));
}

#[test]
fn retire_suite_lines_is_idempotent() {
    let content = "deb https://enterprise.proxmox.com/debian/pve bookworm pve-enterprise\n";
    let once = retire_suite_lines(content, "bookworm").expect("must change");
    assert!(retire_suite_lines(&once, "bookworm").is_none());
}

#[test]
fn backup_destination_mirrors_path_and_never_clobbers() {
    let root = test_root();
    let run_dir = root.join("1771001234");

    let first = backup_destination(&run_dir, Path::new("/etc/apt/sources.list"));
    assert_eq!(first, run_dir.join("etc/apt/sources.list"));

    fs::create_dir_all(first.parent().expect("parent")).expect("must create parent");
    fs::write(&first, "original").expect("must seed backup");
    let second = backup_destination(&run_dir, Path::new("/etc/apt/sources.list"));
    assert_eq!(second, run_dir.join("etc/apt/sources.list.1"));

    let _ = fs::remove_dir_all(root);
}

#[test]
fn fs_rewriter_backs_up_before_write_and_reads_missing_as_none() {
    let root = test_root();
    let target = root.join("etc/apt/sources.list.d/proxmox.sources");
    let rewriter = FsRepositoryRewriter::new(root.join("backups"), 1_771_001_234);

    assert_eq!(rewriter.read_file(&target).expect("must read"), None);
    assert_eq!(rewriter.backup_file(&target).expect("must back up"), None);

    rewriter
        .write_repository_config("Suites: bookworm\n", &target)
        .expect("must write");
    let backup = rewriter
        .backup_file(&target)
        .expect("must back up")
        .expect("backup must exist");
    assert!(backup.starts_with(rewriter.backup_run_dir()));

    rewriter
        .write_repository_config("Suites: trixie\n", &target)
        .expect("must rewrite");
    assert_eq!(
        rewriter.read_file(&target).expect("must read").as_deref(),
        Some("Suites: trixie\n")
    );
    assert_eq!(
        fs::read_to_string(&backup).expect("must read backup"),
        "Suites: bookworm\n"
    );
    assert!(!target.with_file_name("proxmox.sources.part").exists());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn install_verified_keyring_rejects_checksum_mismatch_without_writing() {
    let root = test_root();
    let dest = root.join("keyrings/proxmox-archive-keyring.gpg");
    let wrong = sha256_hex(b"some other keyring");

    let err = install_verified_keyring(b"keyring bytes", &wrong, &dest)
        .expect_err("mismatch must fail");
    assert!(err.to_string().contains("keyring checksum mismatch"));
    assert!(!dest.exists());

    let _ = fs::remove_dir_all(root);
}

#[test]
fn install_verified_keyring_writes_matching_payload() {
    let root = test_root();
    let dest = root.join("keyrings/proxmox-archive-keyring.gpg");
    let expected = sha256_hex(b"keyring bytes");

    install_verified_keyring(b"keyring bytes", &expected, &dest).expect("must install");
    let rewriter = FsRepositoryRewriter::new(root.join("backups"), 1);
    assert!(rewriter
        .keyring_matches(&dest, &expected)
        .expect("must verify"));
    assert!(!rewriter
        .keyring_matches(&dest, &sha256_hex(b"other"))
        .expect("must verify"));

    let _ = fs::remove_dir_all(root);
}
