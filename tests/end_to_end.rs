use anyhow::Context;

mod support;

const MOUNT: u8 = 0x00;
const UNMOUNT: u8 = 0x01;
const OPENDIR: u8 = 0x10;
const READDIR: u8 = 0x11;
const OPENDIRX: u8 = 0x17;
const READDIRX: u8 = 0x18;
const OPEN: u8 = 0x20;
const READ: u8 = 0x21;
const WRITE: u8 = 0x22;
const STAT: u8 = 0x24;
const LSEEK: u8 = 0x25;
const RENAME: u8 = 0x28;
const OPEN_LEGACY: u8 = 0x29;

const KIND_FILE: u8 = 0x02;

const STATUS_SUCCESS: u8 = 0;
const STATUS_ACCESS_DENIED: u8 = 1;
const STATUS_NO_SUCH_FILE: u8 = 2;
const STATUS_INVALID_SESSION: u8 = 5;
const STATUS_END_OF_FILE: u8 = 9;

fn request(session_id: u16, sequence: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(&session_id.to_le_bytes());
    out.push(sequence);
    out.push(command);
    out.extend_from_slice(payload);
    out
}

struct Reply {
    session_id: u16,
    sequence: u8,
    command: u8,
    status: u8,
    payload: Vec<u8>,
}

fn decode_reply(bytes: &[u8]) -> Reply {
    assert!(bytes.len() >= 5, "reply too short: {:?}", bytes);
    Reply {
        session_id: u16::from_le_bytes([bytes[0], bytes[1]]),
        sequence: bytes[2],
        command: bytes[3],
        status: bytes[4],
        payload: bytes[5..].to_vec(),
    }
}

fn cstr(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.push(0);
    out
}

fn mount_payload(path: &str) -> Vec<u8> {
    let mut out = vec![1u8, 0u8]; // protocol version 1, LE
    out.extend_from_slice(&cstr(path));
    out.extend_from_slice(&cstr("anonymous"));
    out.extend_from_slice(&cstr(""));
    out
}

fn mount(client: &support::Client) -> anyhow::Result<u16> {
    let reply = decode_reply(&client.request(&request(0, 0, MOUNT, &mount_payload("/")))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    assert_ne!(reply.session_id, 0);
    Ok(reply.session_id)
}

#[test]
fn mount_then_unmount_then_invalid_session() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    let client = daemon.client()?;

    let sid = mount(&client)?;

    let reply = decode_reply(&client.request(&request(sid, 1, UNMOUNT, &[]))?);
    assert_eq!(reply.status, STATUS_SUCCESS);

    let stat_payload = cstr("/");
    let reply = decode_reply(&client.request(&request(sid, 2, STAT, &stat_payload))?);
    assert_eq!(reply.status, STATUS_INVALID_SESSION);

    Ok(())
}

#[test]
fn directory_listing_has_dot_entries() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    std::fs::write(daemon.root.join("a.txt"), b"hi").context("seeding file")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let reply = decode_reply(&client.request(&request(sid, 1, OPENDIR, &cstr("/")))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let handle = reply.payload[0];

    let mut names = Vec::new();
    for seq in 2..6u8 {
        let reply = decode_reply(&client.request(&request(sid, seq, READDIR, &[handle]))?);
        if reply.status == STATUS_END_OF_FILE {
            break;
        }
        assert_eq!(reply.status, STATUS_SUCCESS);
        let name = String::from_utf8_lossy(&reply.payload[..reply.payload.len() - 1]).into_owned();
        names.push(name);
    }

    assert_eq!(&names[0], ".");
    assert_eq!(&names[1], "..");
    assert!(names.iter().any(|n| n == "a.txt"));

    Ok(())
}

#[test]
fn confinement_rejects_path_traversal() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut payload = cstr("/../etc/passwd");
    payload.extend_from_slice(&0u16.to_le_bytes()); // flags: read-only

    let reply = decode_reply(&client.request(&request(sid, 1, OPEN, &payload))?);
    assert_eq!(reply.status, STATUS_ACCESS_DENIED);
    assert!(reply.payload.is_empty());

    Ok(())
}

#[test]
fn short_read_at_end_of_file() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    std::fs::write(daemon.root.join("f.bin"), vec![7u8; 100]).context("seeding file")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut open_payload = cstr("/f.bin");
    open_payload.extend_from_slice(&0u16.to_le_bytes());
    let reply = decode_reply(&client.request(&request(sid, 1, OPEN, &open_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let handle = reply.payload[0];

    let mut seek_payload = vec![handle, 0u8];
    seek_payload.extend_from_slice(&95i64.to_le_bytes());
    let reply = decode_reply(&client.request(&request(sid, 2, LSEEK, &seek_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);

    let mut read_payload = vec![handle];
    read_payload.extend_from_slice(&100u16.to_le_bytes());
    let reply = decode_reply(&client.request(&request(sid, 3, READ, &read_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let count = u16::from_le_bytes([reply.payload[0], reply.payload[1]]);
    assert_eq!(count, 5);

    let reply = decode_reply(&client.request(&request(sid, 4, READ, &read_payload))?);
    assert_eq!(reply.status, STATUS_END_OF_FILE);

    Ok(())
}

#[test]
fn replay_suppresses_duplicate_write() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut open_payload = cstr("/hello.txt");
    open_payload.extend_from_slice(&0x0101u16.to_le_bytes()); // write + create
    let reply = decode_reply(&client.request(&request(sid, 1, OPEN, &open_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let handle = reply.payload[0];

    let data = b"HELLO";
    let mut write_payload = vec![handle];
    write_payload.extend_from_slice(&(data.len() as u16).to_le_bytes());
    write_payload.extend_from_slice(data);
    let datagram = request(sid, 7, WRITE, &write_payload);

    let first = client.request(&datagram)?;
    let second = client.request(&datagram)?;
    assert_eq!(first, second);

    let contents = std::fs::read(daemon.root.join("hello.txt"))?;
    assert_eq!(contents, b"HELLO");

    Ok(())
}

#[test]
fn extended_directory_listing_applies_entry_kind_mask() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    std::fs::write(daemon.root.join("a.txt"), b"hi").context("seeding file")?;
    std::fs::write(daemon.root.join("b.txt"), b"there").context("seeding file")?;
    std::fs::create_dir(daemon.root.join("sub")).context("seeding dir")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut open_payload = cstr("/");
    open_payload.extend_from_slice(&cstr("")); // no pattern
    open_payload.push(KIND_FILE); // files only, no dirs, no hidden
    open_payload.push(0); // sort by name
    open_payload.push(0); // ascending
    open_payload.extend_from_slice(&0u16.to_le_bytes()); // no cap
    let reply = decode_reply(&client.request(&request(sid, 1, OPENDIRX, &open_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let handle = reply.payload[0];

    let mut read_payload = vec![handle];
    read_payload.extend_from_slice(&10u16.to_le_bytes());
    let reply = decode_reply(&client.request(&request(sid, 2, READDIRX, &read_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    let count = u16::from_le_bytes([reply.payload[0], reply.payload[1]]);
    assert_eq!(count, 2, "the subdirectory must be excluded by the files-only kind mask");

    Ok(())
}

#[test]
fn legacy_open_opcode_creates_file_via_legacy_flag_layout() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut payload = cstr("/legacy.txt");
    payload.extend_from_slice(&0x0010u16.to_le_bytes()); // legacy create bit
    let reply = decode_reply(&client.request(&request(sid, 1, OPEN_LEGACY, &payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);
    assert!(daemon.root.join("legacy.txt").exists());

    Ok(())
}

#[test]
fn rename_across_directories() -> anyhow::Result<()> {
    let daemon = support::DaemonProc::new().context("starting daemon")?;
    std::fs::create_dir(daemon.root.join("a")).context("mkdir a")?;
    std::fs::create_dir(daemon.root.join("b")).context("mkdir b")?;
    std::fs::write(daemon.root.join("a").join("x"), b"hi").context("seeding file")?;

    let client = daemon.client()?;
    let sid = mount(&client)?;

    let mut rename_payload = cstr("/a/x");
    rename_payload.extend_from_slice(&cstr("/b/x"));
    let reply = decode_reply(&client.request(&request(sid, 1, RENAME, &rename_payload))?);
    assert_eq!(reply.status, STATUS_SUCCESS);

    let reply = decode_reply(&client.request(&request(sid, 2, STAT, &cstr("/a/x")))?);
    assert_eq!(reply.status, STATUS_NO_SUCH_FILE);

    let reply = decode_reply(&client.request(&request(sid, 3, STAT, &cstr("/b/x")))?);
    assert_eq!(reply.status, STATUS_SUCCESS);

    Ok(())
}
