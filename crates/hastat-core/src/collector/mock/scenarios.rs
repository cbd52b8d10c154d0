//! Canned HAProxy responses for a small deployment.
//!
//! One `http-in` frontend balancing to backend `web` with servers `web1` and
//! `web2`, and one resolvers section with two nameservers.

use crate::collector::endpoint::Endpoint;

use super::transport::MockTransport;

/// `show info` output of process 1.
pub const SHOW_INFO: &str = "\
Name: HAProxy
Version: 1.8.8
Release_date: 2018/04/19
Nbproc: 1
Process_num: 1
Pid: 1234
Uptime: 0d 1h02m03s
Uptime_sec: 3723
Memmax_MB: 0
Ulimit-n: 4031
Maxsock: 4031
Maxconn: 2000
Hard_maxconn: 2000
CurrConns: 3
CumConns: 1502
CumReq: 1640
MaxSslConns: 0
CurrSslConns: 0
CumSslConns: 0
Maxpipes: 0
PipesUsed: 0
PipesFree: 0
ConnRate: 2
ConnRateLimit: 0
MaxConnRate: 12
SessRate: 2
SessRateLimit: 0
MaxSessRate: 12
SslRate: 0
CompressBpsIn: 0
CompressBpsOut: 0
ZlibMemUsage: 0
Tasks: 18
Run_queue: 1
Idle_pct: 97
node: lb1
description:
";

/// `show stat` output: frontend, two servers, backend.
pub const SHOW_STAT: &str = "\
# pxname,svname,qcur,qmax,scur,smax,slim,stot,bin,bout,dreq,dresp,ereq,econ,eresp,wretr,wredis,status,weight,act,bck,chkfail,downtime,pid,iid,sid,lbtot,type,rate,rate_max,hrsp_2xx,hrsp_5xx,qtime,ctime,rtime,ttime,
http-in,FRONTEND,,,3,10,2000,1500,123456,654321,0,0,2,,,,,OPEN,,,,,,1,2,0,,0,5,20,1400,3,,,,,
web,web1,0,0,1,5,,700,60000,300000,,0,,0,0,0,0,UP,1,1,0,0,0,1,3,1,700,2,2,9,690,1,0,1,12,40,
web,web2,0,0,2,6,,800,63456,354321,,0,,0,0,0,0,UP,1,1,0,1,0,1,3,2,800,2,3,11,710,2,2,1,18,60,
web,BACKEND,0,0,3,10,200,1500,123456,654321,0,0,,0,0,0,0,UP,2,2,0,,0,1,3,0,1500,1,5,20,1400,3,1,1,15,50,
";

/// `show resolvers` output with two nameservers.
pub const SHOW_RESOLVERS: &str = "\
Resolvers section mydns
 nameserver dns1:
  sent:              8
  snd_error:         0
  valid:             8
  update:            0
  cname:             0
  cname_error:       0
  any_err:           0
  nx:                0
  timeout:           0
  refused:           0
  other:             0
  invalid:           0
  too_big:           0
  truncated:         0
  outdated:          0
 nameserver dns2:
  sent:              4
  snd_error:         1
  valid:             3
  update:            0
  cname:             0
  cname_error:       0
  any_err:           0
  nx:                0
  timeout:           1
  refused:           0
  other:             0
  invalid:           0
  too_big:           0
  truncated:         0
  outdated:          0

";

/// HAProxy's reply to a command it does not implement.
pub const UNKNOWN_COMMAND: &str = "\
Unknown command. Please enter one of the following commands only :
  help           : this message
  prompt         : toggle interactive mode with prompt
  quit           : disconnect
";

/// `show info` output as reported by process `n` of a multi-process setup.
pub fn info_for_process(n: u32) -> String {
    SHOW_INFO.replace("Process_num: 1", &format!("Process_num: {}", n))
}

impl MockTransport {
    /// A single HAProxy process answering `show info`, `show stat` and
    /// `show resolvers` on `endpoint`.
    pub fn typical_haproxy(endpoint: &Endpoint) -> Self {
        let mut transport = Self::new();
        transport.add_process(endpoint, 1);
        transport
    }

    /// Adds one HAProxy process with the typical fixture data.
    pub fn add_process(&mut self, endpoint: &Endpoint, process_num: u32) {
        self.add_response(endpoint, "show info", info_for_process(process_num));
        self.add_response(endpoint, "show stat", SHOW_STAT);
        self.add_response(endpoint, "show resolvers", SHOW_RESOLVERS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_fixture_rows_match_header() {
        let mut lines = SHOW_STAT.lines();
        let header_cols = lines.next().unwrap().split(',').count();
        for line in lines {
            assert_eq!(line.split(',').count(), header_cols, "row: {}", line);
        }
    }

    #[test]
    fn test_info_for_process() {
        let info = info_for_process(2);
        assert!(info.contains("Process_num: 2"));
        assert!(!info.contains("Process_num: 1"));
    }
}
