use romdata_core::{JsonOpts, ReadLimits, RomInfo};

fn sndh_file() -> Vec<u8> {
    let mut v = vec![0x60, 0x00, 0x00, 0x0E, 0x60, 0x00, 0x00, 0x10, 0x60, 0x00, 0x00, 0x12];
    v.extend_from_slice(b"SNDH");
    v.extend_from_slice(b"TITLLed Storm\0COMMTim Follin\0YEAR1990\0##02");
    v.extend_from_slice(b"!#SN\x00\x08\x00\x0eIntro\0Level 1\0");
    v.extend_from_slice(b"TIME\x00\x3c\x01\x2cHDNS");
    v.extend(vec![0u8; 64]);
    v
}

fn vgm_file() -> Vec<u8> {
    let mut h = vec![0u8; 0x100];
    h[..4].copy_from_slice(b"Vgm ");
    h[0x08..0x0C].copy_from_slice(&0x0171u32.to_le_bytes());
    h[0x0C..0x10].copy_from_slice(&3_579_545u32.to_le_bytes());
    h[0x14..0x18].copy_from_slice(&(0x100u32 - 0x14).to_le_bytes());
    h[0x18..0x1C].copy_from_slice(&(44_100u32 * 90).to_le_bytes());
    h[0x2C..0x30].copy_from_slice(&7_670_453u32.to_le_bytes());
    h[0x34..0x38].copy_from_slice(&0xCCu32.to_le_bytes());
    let strings = [
        "Angel Island", "", "Sonic 3", "", "Mega Drive", "", "Jun Senoue", "", "1994", "", "",
    ];
    let mut data = Vec::new();
    for s in strings {
        data.extend(s.encode_utf16().flat_map(u16::to_le_bytes));
        data.extend_from_slice(&[0, 0]);
    }
    h.extend_from_slice(b"Gd3 ");
    h.extend_from_slice(&0x0100u32.to_le_bytes());
    h.extend_from_slice(&(data.len() as u32).to_le_bytes());
    h.extend(data);
    h
}

fn ciso_file() -> Vec<u8> {
    let bs = 1usize << 15;
    let mut v = vec![0u8; 0x8000];
    v[..4].copy_from_slice(b"CISO");
    v[4..8].copy_from_slice(&(bs as u32).to_le_bytes());
    v[8] = 1;
    v[10] = 1;
    v.extend(vec![0xAB; 2 * bs]);
    v
}

fn psv_file() -> Vec<u8> {
    let mut v = vec![0u8; 0x284];
    v[..8].copy_from_slice(&[0x00, b'V', b'S', b'P', 0, 0, 0, 0]);
    v[0x64..0x70].copy_from_slice(b"BESLES-01370");
    v[0x84..0x86].copy_from_slice(b"SC");
    v[0x86] = 0x12;
    v[0x87] = 1;
    v[0x88..0x8D].copy_from_slice(b"SAVE1");
    v
}

#[test]
fn detects_each_format_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let cases: [(&str, Vec<u8>); 4] = [
        ("tune.sndh", sndh_file()),
        ("song.vgm", vgm_file()),
        ("disc.ciso", ciso_file()),
        ("save.psv", psv_file()),
    ];
    for (name, bytes) in &cases {
        std::fs::write(dir.path().join(name), bytes).unwrap();
    }
    let limits = ReadLimits::default();
    let open = |name: &str| {
        let mut f = std::fs::File::open(dir.path().join(name)).unwrap();
        romdata_core::detect(&mut f, &limits).unwrap()
    };

    let RomInfo::Sndh(sndh) = open("tune.sndh") else {
        panic!("expected SNDH");
    };
    assert_eq!(sndh.title.as_deref(), Some("Led Storm"));
    assert_eq!(sndh.subtune_names, vec!["Intro", "Level 1"]);
    assert_eq!(sndh.subtune_lengths, vec![60, 300]);

    let RomInfo::Vgm(vgm) = open("song.vgm") else {
        panic!("expected VGM");
    };
    let meta = vgm.metadata();
    assert_eq!(meta.title.as_deref(), Some("Angel Island"));
    assert_eq!(meta.release_year, Some(1994));
    assert_eq!(meta.duration_ms, 90_000);
    assert_eq!(vgm.chips[0].name, "YM2612");

    let RomInfo::Ciso(ciso) = open("disc.ciso") else {
        panic!("expected CISO");
    };
    assert_eq!(ciso.disc_size, 3 << 15);
    assert_eq!(ciso.used_blocks, 2);

    let RomInfo::Psv(psv) = open("save.psv") else {
        panic!("expected PSV");
    };
    assert_eq!(psv.filename, "BESLES-01370");
    assert_eq!(psv.description, "SAVE1");
    assert_eq!(psv.icon.frames, 2);
}

#[test]
fn dump_file_json_renders_display_fields() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("tune.sndh");
    std::fs::write(&p, sndh_file()).unwrap();
    let js = romdata_core::dump_file_json(&p, JsonOpts::default(), &ReadLimits::default()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&js).unwrap();
    assert_eq!(v["format"], "Atari ST SNDH");
    assert_eq!(v["fields"]["Composer"], "Tim Follin");
    assert_eq!(v["fields"]["Year of Release"], "1990");
    assert_eq!(v["fields"]["# of Subtunes"], "2");
    let rows = v["fields"]["Subtune List"]["rows"].as_array().unwrap();
    assert_eq!(rows[1], serde_json::json!(["2", "Level 1", "5:00"]));
}

#[test]
fn dump_file_json_includes_vgm_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("song.vgm");
    std::fs::write(&p, vgm_file()).unwrap();
    let js = romdata_core::dump_file_json(&p, JsonOpts::default(), &ReadLimits::default()).unwrap();
    let v: serde_json::Value = serde_json::from_str(&js).unwrap();
    let meta = &v["metadata"];
    assert_eq!(meta["duration_ms"], 90_000);
    assert_eq!(meta["title"], "Angel Island");
    assert_eq!(meta["album"], "Sonic 3");
    assert_eq!(meta["composer"], "Jun Senoue");
    assert_eq!(meta["release_year"], 1994);
    assert!(meta["comment"].is_null());
    assert_eq!(v["fields"]["Release Date"], "1994");
}

#[test]
fn dir_map_reports_errors_per_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.vgm"), vgm_file()).unwrap();
    std::fs::write(dir.path().join("b.txt"), b"plain text").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("c.psv"), psv_file()).unwrap();

    let opts = JsonOpts::default();
    let limits = ReadLimits::default();
    let flat = romdata_core::dump_dir_map_json(dir.path(), false, opts, &limits).unwrap();
    let v: serde_json::Value = serde_json::from_str(&flat).unwrap();
    let map = v.as_object().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["a.vgm"]["fields"]["Track Name"], "Angel Island");
    assert!(map["b.txt"]["$error"].as_str().unwrap().contains("not a recognized format"));

    let deep = romdata_core::dump_dir_map_json(dir.path(), true, opts, &limits).unwrap();
    let v: serde_json::Value = serde_json::from_str(&deep).unwrap();
    let key = std::path::Path::new("sub").join("c.psv");
    assert_eq!(v[&*key.to_string_lossy()]["fields"]["Icon"], "2 frames, 320 ms");
}

#[test]
fn truncated_vgm_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("short.vgm");
    std::fs::write(&p, &vgm_file()[..0x80]).unwrap();
    let err = romdata_core::dump_file_json(&p, JsonOpts::default(), &ReadLimits::default()).unwrap_err();
    assert!(matches!(err, romdata_core::Error::Rejected));
}
