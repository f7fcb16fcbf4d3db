//! End-to-end checks over the public API: build a tree, render it, push it
//! through the body codec, and make sure rendering is unchanged.

use chrono::{NaiveDate, NaiveDateTime};
use kpx_core::packed_time::{pack, unpack};
use kpx_core::{decode_body, encode_body, EntryOptions, Root};
use kpx_util::{write_group_tree, GroupNode};
use proptest::prelude::*;

fn render(root: &Root) -> String {
    let mut buf = Vec::new();
    root.write_tree(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

fn sample() -> Root {
    let mut root = Root::new();
    let net = root.add_group("Internet").unwrap().group_id;
    root.add_entry(net, "forum", EntryOptions::default()).unwrap();
    root.add_entry(net, "mail", EntryOptions::default()).unwrap();
    let shops = root.add_subgroup(net, "Shops").unwrap().group_id;
    root.add_entry(shops, "books", EntryOptions::default()).unwrap();
    root.add_subgroup(shops, "Games").unwrap();
    root.add_group("Backup").unwrap();
    root
}

#[test]
fn renders_nested_layout() {
    let expected = concat!(
        "***[Internet]***\n",
        "  -forum\n",
        "  -mail\n",
        "    ***[Shops]***\n",
        "      -books\n",
        "        ***[Games]***\n",
        "***[Backup]***\n",
    );
    assert_eq!(render(&sample()), expected);
}

#[test]
fn rendering_survives_the_body_codec() {
    let root = sample();
    let body = encode_body(&root).unwrap();
    let back = decode_body(&body, 4, 3).unwrap();
    assert_eq!(render(&back), render(&root));
}

#[test]
fn single_group_at_a_custom_level() {
    let root = sample();
    let shops = &root.groups()[0].children()[0];
    let mut buf = Vec::new();
    write_group_tree(&mut buf, shops, 1).unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        " ***[Shops]***\n   -books\n     ***[Games]***\n"
    );
}

fn arb_time() -> impl Strategy<Value = NaiveDateTime> {
    (0i32..4096, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(|(y, mo, d, h, mi, s)| {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|d| d.and_hms_opt(h, mi, s))
            .unwrap()
    })
}

proptest! {
    #[test]
    fn packed_time_roundtrip(t in arb_time()) {
        // The "never" sentinel is the only value that does not come back as itself.
        let never = NaiveDate::from_ymd_opt(2999, 12, 28).unwrap().and_hms_opt(23, 59, 59).unwrap();
        prop_assume!(t != never);
        prop_assert_eq!(unpack(pack(Some(t)).unwrap()).unwrap(), Some(t));
    }
}
