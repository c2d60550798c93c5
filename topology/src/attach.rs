//! The attachment policy (C6): resolve `(ip?, city?, country?)` hints to a
//! single graph vertex.
//!
//! This preserves three source quirks verbatim rather than "fixing" them,
//! per the design notes this engine was distilled from:
//! - the "longest prefix" match scores candidates by the raw numeric
//!   magnitude of `!(candidate_ip ^ hint_ip)`, not by counted matching bits
//!   or a true longest common prefix;
//! - the uniform-random fallback computes `round(rng() * (n - 1))` and
//!   walks that many steps into the candidate queue, which biases toward
//!   low-indexed vertices whenever `round()` yields 0;
//! - an exact IP match short-circuits city/country filtering entirely.

use std::net::Ipv4Addr;

use petgraph::graph::NodeIndex;

use crate::graph::NetworkGraph;

/// The simulator's source of randomness, exposed the way the attachment
/// policy consumes it: one uniform draw in `[0, 1)` at a time.
pub trait Random {
    fn next_f64(&mut self) -> f64;
}

impl Random for rand_chacha::ChaCha8Rng {
    fn next_f64(&mut self) -> f64 {
        use rand::Rng;
        self.gen_range(0.0..1.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct AttachmentHints<'a> {
    pub ip: Option<Ipv4Addr>,
    pub city: Option<&'a str>,
    pub country: Option<&'a str>,
}

#[derive(Debug)]
pub struct Attachment {
    pub vertex: NodeIndex,
    pub bandwidth_down_kibps: f64,
    pub bandwidth_up_kibps: f64,
}

struct Candidate {
    vertex: NodeIndex,
    usable_ip: Option<Ipv4Addr>,
}

/// Select exactly one vertex for the given hints. `C_all` always contains
/// every vertex, so the queue chosen in step 3 is never empty.
pub fn attach(graph: &NetworkGraph, hints: &AttachmentHints, rng: &mut impl Random) -> Attachment {
    let mut all = Vec::new();
    let mut city = Vec::new();
    let mut country = Vec::new();
    let mut exact_match: Option<NodeIndex> = None;

    for v in graph.all_indices() {
        let vertex = graph.vertex(v);
        let usable_ip = vertex.usable_ip();

        if exact_match.is_none() {
            if let (Some(hint_ip), Some(candidate_ip)) = (hints.ip, usable_ip) {
                if candidate_ip == hint_ip {
                    exact_match = Some(v);
                    // an exact match clears everything accumulated so far;
                    // from here on only exact-IP vertices enter `all`.
                    all.clear();
                    city.clear();
                    country.clear();
                }
            }
        }

        if exact_match.is_some() && Some(v) != exact_match {
            continue;
        }

        all.push(Candidate { vertex: v, usable_ip });

        if let Some(hint_city) = hints.city {
            if vertex
                .city_code
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case(hint_city))
            {
                city.push(Candidate { vertex: v, usable_ip });
            }
        }
        if let Some(hint_country) = hints.country {
            if vertex
                .country_code
                .as_deref()
                .map_or(false, |c| c.eq_ignore_ascii_case(hint_country))
            {
                country.push(Candidate { vertex: v, usable_ip });
            }
        }
    }

    let exact_found = exact_match.is_some();

    // narrowest non-empty queue wins: city -> country -> all
    let queue = if !city.is_empty() {
        city
    } else if !country.is_empty() {
        country
    } else {
        all
    };

    let usable_count = queue.iter().filter(|c| c.usable_ip.is_some()).count();

    let chosen = if usable_count >= 1 && hints.ip.is_some() && !exact_found {
        longest_prefix_match(&queue, hints.ip.unwrap())
    } else {
        random_pick(&queue, rng)
    };

    let vertex = graph.vertex(chosen);
    Attachment {
        vertex: chosen,
        bandwidth_down_kibps: vertex.bandwidth_down_kibps(),
        bandwidth_up_kibps: vertex.bandwidth_up_kibps(),
    }
}

/// Score each usable-IP candidate by the raw numeric magnitude of
/// `!(candidate_ip ^ hint_ip)` (preserved verbatim; see module docs). The
/// first-seen candidate wins ties.
fn longest_prefix_match(queue: &[Candidate], hint_ip: Ipv4Addr) -> NodeIndex {
    let hint = u32::from(hint_ip);
    let mut best: Option<(u32, NodeIndex)> = None;

    for candidate in queue {
        let Some(ip) = candidate.usable_ip else {
            continue;
        };
        let score = !(u32::from(ip) ^ hint);
        best = Some(match best {
            Some((best_score, best_vertex)) if best_score >= score => (best_score, best_vertex),
            _ => (score, candidate.vertex),
        });
    }

    best.expect("caller guarantees at least one usable-IP candidate").1
}

/// `round(rng() * (n - 1))`, then walk that many steps into the queue.
/// Implemented directly as an index instead of destructively popping a
/// list, which is behaviourally identical but avoids the allocation churn.
fn random_pick(queue: &[Candidate], rng: &mut impl Random) -> NodeIndex {
    let n = queue.len();
    if n == 1 {
        return queue[0].vertex;
    }
    let idx = (rng.next_f64() * (n - 1) as f64).round() as usize;
    queue[idx.min(n - 1)].vertex
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRng(f64);
    impl Random for FixedRng {
        fn next_f64(&mut self) -> f64 {
            self.0
        }
    }

    fn graph_with_hosts() -> NetworkGraph {
        let mut gml = String::from("graph [\n directed 0\n");
        for i in 1..=10u32 {
            let city = if i <= 3 { "NYC" } else { "LAX" };
            let ip = if i == 1 {
                "10.0.0.5".to_string()
            } else {
                format!("10.0.0.{}", i + 10)
            };
            gml.push_str(&format!(
                "node [ id {i} bandwidth_down \"1 Mbit\" bandwidth_up \"1 Mbit\" ip_address \"{ip}\" city_code \"{city}\" country_code \"US\" ]\n"
            ));
        }
        for i in 1..10u32 {
            gml.push_str(&format!(
                "edge [ source {i} target {} latency \"1 ms\" packet_loss 0.0 ]\n",
                i + 1
            ));
        }
        gml.push_str("]\n");
        NetworkGraph::parse(&gml).unwrap()
    }

    #[test]
    fn exact_ip_hint_wins_regardless_of_city_hint() {
        // S5: ten vertices, three with city_code="NYC", one with ip_address="10.0.0.5".
        let g = graph_with_hosts();
        let hints = AttachmentHints {
            ip: Some("10.0.0.5".parse().unwrap()),
            city: Some("nyc"),
            country: None,
        };
        let mut rng = FixedRng(0.99);
        let result = attach(&g, &hints, &mut rng);
        assert_eq!(result.vertex, g.node_index(1).unwrap());
    }

    #[test]
    fn city_hint_narrows_to_city_queue() {
        let g = graph_with_hosts();
        let hints = AttachmentHints {
            ip: None,
            city: Some("NYC"),
            country: None,
        };
        let mut rng = FixedRng(0.0);
        let result = attach(&g, &hints, &mut rng);
        let vertex = g.vertex(result.vertex);
        assert_eq!(vertex.city_code.as_deref(), Some("NYC"));
    }

    #[test]
    fn random_fallback_biases_toward_low_index_on_zero_draw() {
        let g = graph_with_hosts();
        let hints = AttachmentHints {
            ip: None,
            city: None,
            country: None,
        };
        let mut rng = FixedRng(0.0);
        let result = attach(&g, &hints, &mut rng);
        assert_eq!(result.vertex, g.node_index(1).unwrap());
    }
}
