//! Built-in source registries.
//!
//! Registries are plain data. They are referenced by the presets in
//! [`crate::config`] and can be replaced wholesale by the `sources` list of a
//! YAML config file.

use crate::models::FeedSource;

/// Popular Hacker News blogs, full list.
const POPULAR_BLOGS: &[(&str, &str)] = &[
    ("Simon Willison", "https://simonwillison.net/atom/everything/"),
    ("Jeff Geerling", "https://www.jeffgeerling.com/blog.xml"),
    ("Krebs on Security", "https://krebsonsecurity.com/feed/"),
    ("Daring Fireball", "https://daringfireball.net/feeds/main"),
    ("antirez", "http://antirez.com/rss"),
    ("Pluralistic", "https://pluralistic.net/feed/"),
    ("Mitchell Hashimoto", "https://mitchellh.com/feed.xml"),
    ("Dynomight", "https://dynomight.net/feed.xml"),
    ("Xe Iaso", "https://xeiaso.net/blog.rss"),
    ("Old New Thing", "https://devblogs.microsoft.com/oldnewthing/feed"),
    ("Ken Shirriff", "https://www.righto.com/feeds/posts/default"),
    ("Armin Ronacher", "https://lucumr.pocoo.org/feed.atom"),
    ("Gary Marcus", "https://garymarcus.substack.com/feed"),
    ("Rachel by the Bay", "https://rachelbythebay.com/w/atom.xml"),
    ("Dan Abramov", "https://overreacted.io/rss.xml"),
    ("John D Cook", "https://www.johndcook.com/blog/feed/"),
    ("matklad", "https://matklad.github.io/feed.xml"),
    ("Evan Hahn", "https://evanhahn.com/feed.xml"),
    ("Terrible Software", "https://terriblesoftware.org/feed/"),
    ("Paul Graham", "http://www.aaronsw.com/2002/feeds/pgessays.rss"),
    ("Julia Evans", "https://jvns.ca/atom.xml"),
    ("Stratechery", "https://stratechery.com/feed/"),
    ("Hillel Wayne", "https://www.hillelwayne.com/index.xml"),
    ("fasterthanli.me", "https://fasterthanli.me/index.xml"),
    ("Drew DeVault", "https://drewdevault.com/blog/index.xml"),
    ("Molly White", "https://www.citationneeded.news/rss/"),
    ("Lenny's Newsletter", "https://www.lennysnewsletter.com/feed"),
    ("lcamtuf", "https://lcamtuf.substack.com/feed"),
    ("Ben Thompson", "https://stratechery.com/feed/"),
    ("Coding Horror", "https://blog.codinghorror.com/rss/"),
    ("Hacker News", "https://hnrss.org/frontpage"),
];

/// Names from [`POPULAR_BLOGS`] kept for the long-form document edition.
const CURATED_BLOGS: &[&str] = &[
    "Simon Willison",
    "Jeff Geerling",
    "antirez",
    "Pluralistic",
    "Mitchell Hashimoto",
    "Xe Iaso",
    "Gary Marcus",
    "Dan Abramov",
    "matklad",
    "Paul Graham",
    "Julia Evans",
    "Stratechery",
    "fasterthanli.me",
    "Drew DeVault",
    "Coding Horror",
    "Hacker News",
];

/// Curated AI feed; entries carry score/origin annotations in the description.
pub const BESTBLOGS_AI_URL: &str = "https://www.bestblogs.dev/zh/feeds/rss?category=ai&minScore=85";

pub fn popular_blogs() -> Vec<FeedSource> {
    POPULAR_BLOGS
        .iter()
        .map(|(name, url)| FeedSource::new(*name, *url))
        .collect()
}

pub fn curated_blogs() -> Vec<FeedSource> {
    popular_blogs()
        .into_iter()
        .filter(|s| CURATED_BLOGS.contains(&s.name.as_str()))
        .collect()
}

pub fn bestblogs_ai() -> Vec<FeedSource> {
    vec![FeedSource::new("BestBlogs", BESTBLOGS_AI_URL)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_is_subset_of_popular() {
        let popular = popular_blogs();
        let curated = curated_blogs();
        assert_eq!(curated.len(), CURATED_BLOGS.len());
        assert!(curated.iter().all(|c| popular.contains(c)));
    }

    #[test]
    fn test_registry_entries_are_http_urls() {
        for source in popular_blogs().iter().chain(bestblogs_ai().iter()) {
            let parsed = url::Url::parse(&source.url).unwrap();
            assert!(matches!(parsed.scheme(), "http" | "https"), "{}", source.url);
            assert!(!source.name.is_empty());
        }
    }
}
