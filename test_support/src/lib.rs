//! ABOUTME: Shared testing utilities and fixtures
//! ABOUTME: Sample NGINX-RTMP status documents used across crates

/// Status page with two applications that each publish a stream named
/// `cam_1a2b3c`.
///
/// Server: uptime 1500s, bw_in 2 MiB/s, bw_out 1 MiB/s.
/// `live/cam_1a2b3c`: time 1500ms, bw_in 1 MiB/s.
/// `backup/cam_1a2b3c`: time 3000ms, bw_out 2 MiB/s.
pub const STATUS_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<?xml-stylesheet type="text/xsl" href="stat.xsl" ?>
<rtmp>
<nginx_version>1.18.0</nginx_version>
<nginx_rtmp_version>1.1.4</nginx_rtmp_version>
<compiler>gcc 9.3.0 (Ubuntu 9.3.0-10ubuntu2) </compiler>
<built>Jun  2 2020 14:43:28</built>
<pid>7</pid>
<uptime>1500</uptime>
<naccepted>3</naccepted>
<bw_in>2097152</bw_in>
<bytes_in>734003200</bytes_in>
<bw_out>1048576</bw_out>
<bytes_out>367001600</bytes_out>
<server>
<application>
<name>live</name>
<live>
<stream>
<name>cam_1a2b3c</name>
<time>1500</time>
<bw_in>1048576</bw_in>
<bytes_in>1024</bytes_in>
<bw_out>524288</bw_out>
<bytes_out>2048</bytes_out>
<bw_audio>131072</bw_audio>
<bw_video>917504</bw_video>
<client>
<id>4</id>
<address>10.0.0.5</address>
<time>1499</time>
<flashver>FMLE/3.0 (compatible; FMSc/1.0)</flashver>
<dropped>0</dropped>
<avsync>-3</avsync>
<timestamp>1400</timestamp>
<publishing/>
<active/>
</client>
<meta>
<video><width>1280</width><height>720</height><frame_rate>30</frame_rate><codec>H264</codec></video>
<audio><codec>AAC</codec><channels>2</channels><sample_rate>44100</sample_rate></audio>
</meta>
<nclients>1</nclients>
<publishing/>
<active/>
</stream>
<nclients>1</nclients>
</live>
</application>
<application>
<name>backup</name>
<live>
<stream>
<name>cam_1a2b3c</name>
<time>3000</time>
<bw_in>0</bw_in>
<bytes_in>4096</bytes_in>
<bw_out>2097152</bw_out>
<bytes_out>8192</bytes_out>
<bw_audio>0</bw_audio>
<bw_video>0</bw_video>
<nclients>2</nclients>
<active/>
</stream>
<nclients>2</nclients>
</live>
</application>
</server>
</rtmp>
"#;

/// Status page with no active streams.
pub const IDLE_STATUS_XML: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<rtmp>
<nginx_version>1.18.0</nginx_version>
<uptime>42</uptime>
<naccepted>0</naccepted>
<bw_in>0</bw_in>
<bytes_in>0</bytes_in>
<bw_out>0</bw_out>
<bytes_out>0</bytes_out>
<server>
<application>
<name>live</name>
<live>
<nclients>0</nclients>
</live>
</application>
</server>
</rtmp>
"#;

/// Status page with garbage in several numeric fields.
pub const MALFORMED_FIELDS_XML: &str = r#"<rtmp>
<uptime>not-a-number</uptime>
<bw_in>1048576</bw_in>
<bytes_in></bytes_in>
<bytes_out>100</bytes_out>
<server>
<application>
<name>live</name>
<live>
<stream>
<name>broken</name>
<time>abc</time>
<bw_in>1048576</bw_in>
<bytes_in>12x</bytes_in>
<bytes_out>77</bytes_out>
</stream>
</live>
</application>
</server>
</rtmp>
"#;

/// Status page whose only stream has no owning application.
pub const ORPHAN_STREAM_XML: &str = r#"<rtmp>
<uptime>10</uptime>
<stream>
<name>orphan</name>
<time>2000</time>
<bytes_in>5</bytes_in>
</stream>
</rtmp>
"#;

/// Status page whose stream name holds a quote, a backslash and a newline.
pub const SPECIAL_NAME_XML: &str = r#"<rtmp>
<uptime>10</uptime>
<server>
<application>
<name>live</name>
<live>
<stream>
<name>a&quot;b\c&#10;d</name>
<time>1000</time>
<bytes_in>5</bytes_in>
</stream>
</live>
</application>
</server>
</rtmp>
"#;

/// A body that is not XML at all.
pub const NOT_XML: &str = "<html><body>502 Bad Gateway</body>";
