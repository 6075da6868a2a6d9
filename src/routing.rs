use std::io;
use std::path::Path;

use rand::Rng;

use crate::config::{load_config, GroupRecord};
use crate::resolver::Error;
use crate::server::ServerDirectory;

/// Names ending in `.suffix`, answered by any one of several equivalent
/// shards.
#[derive(Clone, Debug)]
pub struct RoutingGroup {
    suffix: String,
    shards: Vec<ServerDirectory>,
    next: usize,
}

impl RoutingGroup {
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn shards(&self) -> &[ServerDirectory] {
        &self.shards
    }

    /// Whether `name` ends with `"." + suffix`. Case-sensitive, and the
    /// suffix alone does not match.
    pub fn matches(&self, name: &str) -> bool {
        let (nl, sl) = (name.len(), self.suffix.len());
        nl > sl && name.ends_with(self.suffix.as_str()) &&
        name.as_bytes()[nl - sl - 1] == b'.'
    }

    // Hands out the shards in turn.
    fn rotate(&mut self) -> &ServerDirectory {
        let i = self.next;
        self.next = (self.next + 1) % self.shards.len();
        &self.shards[i]
    }
}

/// Picks the servers to ask for a name.
///
/// Groups are tried in the order their suffix first appeared in the
/// configuration; names that match none go to the catch-all directory.
/// Lookups rotate through a group's shards and so take `&mut self`.
#[derive(Clone, Debug, Default)]
pub struct RoutingTable {
    groups: Vec<RoutingGroup>,
    fallback: Option<ServerDirectory>,
}

impl RoutingTable {
    /// Builds the table, placing each extra shard of a group at a random
    /// position so that processes started together do not favour the same
    /// shard.
    pub fn new(records: Vec<GroupRecord>) -> RoutingTable {
        RoutingTable::with_rng(records, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng>(records: Vec<GroupRecord>, rng: &mut R) -> RoutingTable {
        let mut table = RoutingTable::default();

        for record in records {
            let dir = match ServerDirectory::new(record.servers) {
                Some(dir) => dir,
                None => {
                    warn!("skipping group {:?} without nameservers", record.suffix);
                    continue;
                }
            };

            let suffix = match record.suffix {
                Some(suffix) => suffix,
                None => {
                    if table.fallback.is_some() {
                        warn!("ignoring extra catch-all group {}", dir);
                    } else {
                        table.fallback = Some(dir);
                    }
                    continue;
                }
            };

            match table.groups.iter_mut().find(|g| g.suffix == suffix) {
                Some(group) => {
                    let at = rng.gen_range(0..group.shards.len() + 1);
                    group.shards.insert(at, dir);
                }
                None => {
                    table.groups.push(RoutingGroup {
                        suffix: suffix,
                        shards: vec![dir],
                        next: 0,
                    })
                }
            }
        }

        table
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<RoutingTable> {
        Ok(RoutingTable::new(load_config(path)?))
    }

    pub fn groups(&self) -> &[RoutingGroup] {
        &self.groups
    }

    pub fn fallback(&self) -> Option<&ServerDirectory> {
        self.fallback.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.fallback.is_none()
    }

    /// The servers to ask for `name`, or `NoServersAvailable`.
    pub fn lookup(&mut self, name: &str) -> Result<&ServerDirectory, Error> {
        if let Some(group) = self.groups.iter_mut().find(|g| g.matches(name)) {
            return Ok(group.rotate());
        }

        self.fallback.as_ref().ok_or(Error::NoServersAvailable)
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::net::Ipv4Addr;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::resolver::Error;
    use crate::server::Endpoint;

    fn record(suffix: Option<&str>, last_octet: u8) -> GroupRecord {
        GroupRecord {
            suffix: suffix.map(|s| s.to_string()),
            servers: vec![Endpoint::from(Ipv4Addr::new(10, 0, 0, last_octet))],
        }
    }

    fn first_octet(dir: &ServerDirectory) -> u8 {
        dir.get(0).unwrap().addr().octets()[3]
    }

    #[test]
    fn suffix_matching() {
        let mut table = RoutingTable::new(vec![record(Some("example.com"), 1),
                                               record(None, 9)]);

        assert_eq!(first_octet(table.lookup("a.example.com").unwrap()), 1);
        assert_eq!(first_octet(table.lookup("a.b.example.com").unwrap()), 1);
        // label boundary required
        assert_eq!(first_octet(table.lookup("notexample.com").unwrap()), 9);
        // the suffix itself needs a preceding dot
        assert_eq!(first_octet(table.lookup("example.com").unwrap()), 9);
        assert_eq!(first_octet(table.lookup("a.Example.com").unwrap()), 9);
        assert_eq!(first_octet(table.lookup("a.example.com.").unwrap()), 9);
    }

    #[test]
    fn no_fallback() {
        let mut table = RoutingTable::new(vec![record(Some("example.com"), 1)]);
        assert!(table.lookup("a.example.com").is_ok());
        assert!(matches!(table.lookup("example.org"), Err(Error::NoServersAvailable)));

        let mut table = RoutingTable::new(vec![]);
        assert!(table.is_empty());
        assert!(matches!(table.lookup("a.example.com"), Err(Error::NoServersAvailable)));
    }

    #[test]
    fn groups_match_in_table_order() {
        let mut table = RoutingTable::new(vec![record(Some("b.example"), 1),
                                               record(Some("example"), 2),
                                               record(Some("a.b.example"), 3)]);
        // the broader, earlier group wins
        assert_eq!(first_octet(table.lookup("x.a.b.example").unwrap()), 1);
        assert_eq!(first_octet(table.lookup("x.c.example").unwrap()), 2);
    }

    #[test]
    fn shards_rotate() {
        let records = vec![record(Some("pool"), 1),
                           record(Some("other"), 7),
                           record(Some("pool"), 2),
                           record(Some("pool"), 3),
                           record(None, 9)];
        let mut table = RoutingTable::with_rng(records, &mut StdRng::seed_from_u64(7));
        assert_eq!(table.groups().len(), 2);
        assert_eq!(table.groups()[0].shards().len(), 3);

        let picks: Vec<u8> = (0..6).map(|_| first_octet(table.lookup("x.pool").unwrap())).collect();
        // every shard once per cycle, never the same one twice in a row
        let cycle: HashSet<u8> = picks[..3].iter().cloned().collect();
        let all: HashSet<u8> = [1u8, 2, 3].iter().cloned().collect();
        assert_eq!(cycle, all);
        assert_eq!(&picks[..3], &picks[3..]);

        // other groups and the fallback keep working
        assert_eq!(first_octet(table.lookup("x.other").unwrap()), 7);
        assert_eq!(first_octet(table.lookup("x.none").unwrap()), 9);
    }

    #[test]
    fn shard_order_is_randomised() {
        let records = || (1..6).map(|i| record(Some("pool"), i)).collect::<Vec<_>>();
        let orders: HashSet<Vec<u8>> = (0..20)
            .map(|seed| {
                let table = RoutingTable::with_rng(records(), &mut StdRng::seed_from_u64(seed));
                table.groups()[0].shards().iter().map(first_octet).collect()
            })
            .collect();
        assert!(orders.len() > 1);
        for order in &orders {
            let mut sorted = order.clone();
            sorted.sort();
            assert_eq!(sorted, vec![1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn empty_records_and_second_fallback_are_skipped() {
        let records = vec![GroupRecord {
                               suffix: Some("empty".to_string()),
                               servers: vec![],
                           },
                           record(None, 8),
                           record(None, 9)];
        let mut table = RoutingTable::new(records);
        assert!(table.groups().is_empty());
        assert_eq!(first_octet(table.lookup("x.empty").unwrap()), 8);
    }
}
