use super::*;

#[test]
fn insert_creates_room_lazily() {
    let mut rooms = RoomMap::new();
    assert!(!rooms.has_room("P1"));
    assert!(rooms.insert("P1", "A"));
    assert!(rooms.has_room("P1"));
    assert!(rooms.contains("P1", "A"));
}

#[test]
fn insert_twice_is_idempotent() {
    let mut rooms = RoomMap::new();
    assert!(rooms.insert("P1", "A"));
    assert!(!rooms.insert("P1", "A"));
    assert_eq!(rooms.members("P1"), vec!["A".to_string()]);
}

#[test]
fn last_leave_drops_room() {
    let mut rooms = RoomMap::new();
    rooms.insert("P1", "A");
    rooms.insert("P1", "B");

    assert!(rooms.remove("P1", "A"));
    assert!(rooms.has_room("P1"));

    assert!(rooms.remove("P1", "B"));
    assert!(!rooms.has_room("P1"));
    assert_eq!(rooms.room_count(), 0);
}

#[test]
fn remove_absent_member_is_noop() {
    let mut rooms = RoomMap::new();
    assert!(!rooms.remove("P1", "A"));

    rooms.insert("P1", "B");
    assert!(!rooms.remove("P1", "A"));
    assert!(rooms.contains("P1", "B"));
}

#[test]
fn unknown_room_has_no_members() {
    let rooms = RoomMap::new();
    assert!(rooms.members("nowhere").is_empty());
    assert!(rooms.members_except("nowhere", Some("A")).is_empty());
}

#[test]
fn members_except_filters_one_user() {
    let mut rooms = RoomMap::new();
    for user in ["C", "A", "B"] {
        rooms.insert("P1", user);
    }
    assert_eq!(rooms.members("P1"), vec!["A", "B", "C"]);
    assert_eq!(rooms.members_except("P1", Some("B")), vec!["A", "C"]);
    assert_eq!(rooms.members_except("P1", None), vec!["A", "B", "C"]);
}

#[test]
fn remove_everywhere_reports_rooms_and_cleans_up() {
    let mut rooms = RoomMap::new();
    rooms.insert("N1", "A");
    rooms.insert("N2", "A");
    rooms.insert("N2", "B");
    rooms.insert("N3", "B");

    let mut affected = rooms.remove_everywhere("A");
    affected.sort();
    assert_eq!(affected, vec!["N1", "N2"]);
    assert!(!rooms.has_room("N1"));
    assert_eq!(rooms.members("N2"), vec!["B"]);
    assert!(rooms.remove_everywhere("nobody").is_empty());
}
